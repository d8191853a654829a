//! テスト用の実行系
//!
//! 外部コマンドを実行せず、呼び出しを順番に記録する。

use crate::error::Result;
use crate::executor::{CommandRunner, CommandStatus, Executors, FileTransfer, RemoteExecutor};
use shipflow_core::ServerSpec;
use std::cell::RefCell;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Local(String),
    Remote {
        host: String,
        command: String,
    },
    Script {
        host: String,
        script: String,
    },
    Upload {
        host: String,
        source: String,
        destination: String,
        ignore_existing: bool,
    },
}

#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Call>>,
    /// この文字列を含む呼び出しは終了コード 1 を返す
    fail_on: Option<String>,
}

impl RecordingExecutor {
    pub fn failing_on(needle: &str) -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            fail_on: Some(needle.to_string()),
        }
    }

    pub fn executors(&self) -> Executors<'_> {
        Executors {
            local: self,
            remote: self,
            transfer: self,
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call, text: &str) -> Result<CommandStatus> {
        self.calls.borrow_mut().push(call);
        match &self.fail_on {
            Some(needle) if text.contains(needle.as_str()) => Ok(CommandStatus::from_code(1)),
            _ => Ok(CommandStatus::SUCCESS),
        }
    }
}

impl CommandRunner for RecordingExecutor {
    fn run(&self, command: &str, _stdin: Option<&str>) -> Result<CommandStatus> {
        self.record(Call::Local(command.to_string()), command)
    }
}

impl RemoteExecutor for RecordingExecutor {
    fn run_remote(&self, server: &ServerSpec, command: &str) -> Result<CommandStatus> {
        self.record(
            Call::Remote {
                host: server.host.clone(),
                command: command.to_string(),
            },
            command,
        )
    }

    fn run_remote_script(&self, server: &ServerSpec, script: &str) -> Result<CommandStatus> {
        self.record(
            Call::Script {
                host: server.host.clone(),
                script: script.to_string(),
            },
            script,
        )
    }
}

impl FileTransfer for RecordingExecutor {
    fn upload(
        &self,
        server: &ServerSpec,
        source: &str,
        destination: &str,
        ignore_existing: bool,
    ) -> Result<CommandStatus> {
        self.record(
            Call::Upload {
                host: server.host.clone(),
                source: source.to_string(),
                destination: destination.to_string(),
                ignore_existing,
            },
            source,
        )
    }
}
