//! 外部コマンドの実行
//!
//! ローカルシェル、SSH によるリモート実行、rsync によるファイル転送を
//! トレイトで抽象化します。パイプラインはトレイト経由でのみ外部コマンドを
//! 呼ぶため、テストでは呼び出しを記録する実装に差し替えられます。

use crate::error::{DeployError, Result};
use crate::output;
use crate::shell::shell_escape;
use shipflow_core::ServerSpec;
use std::io::Write;
use std::process::{Command, ExitStatus, Stdio};
use tracing::debug;

/// 外部コマンドの終了ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    code: i32,
}

impl CommandStatus {
    pub const SUCCESS: CommandStatus = CommandStatus { code: 0 };

    pub fn from_code(code: i32) -> Self {
        Self { code }
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// 失敗なら `CommandFailed` に変換
    pub fn check(self, command: &str) -> Result<()> {
        if self.success() {
            Ok(())
        } else {
            Err(DeployError::CommandFailed {
                command: command.to_string(),
                code: self.code,
            })
        }
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self { code };
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self { code: 128 + signal };
            }
        }
        Self { code: 1 }
    }
}

/// 実行オプション
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOptions {
    /// 実行するコマンドを表示する
    pub verbose: bool,
    /// 表示のみで実行しない
    pub dry_run: bool,
}

/// ローカルのシェルコマンド実行
pub trait CommandRunner {
    /// `sh -c` でコマンドを実行し、完了まで待つ
    fn run(&self, command: &str, stdin: Option<&str>) -> Result<CommandStatus>;
}

/// リモートサーバーでのコマンド実行
pub trait RemoteExecutor {
    fn run_remote(&self, server: &ServerSpec, command: &str) -> Result<CommandStatus>;

    /// 複数行のスクリプトを標準入力経由で 1 回の接続で実行
    fn run_remote_script(&self, server: &ServerSpec, script: &str) -> Result<CommandStatus>;
}

/// ローカルからリモートサーバーへのファイル転送
pub trait FileTransfer {
    fn upload(
        &self,
        server: &ServerSpec,
        source: &str,
        destination: &str,
        ignore_existing: bool,
    ) -> Result<CommandStatus>;
}

/// `sh -c` で実行する本番用の実装
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner {
    options: ExecOptions,
}

impl ShellRunner {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, command: &str, stdin: Option<&str>) -> Result<CommandStatus> {
        if self.options.dry_run {
            output::dry_run(command);
            if let Some(input) = stdin {
                for line in input.lines() {
                    output::command(&format!("  | {}", line));
                }
            }
            return Ok(CommandStatus::SUCCESS);
        }

        if self.options.verbose {
            output::command(command);
        }
        debug!(command = %command, "Running shell command");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|e| DeployError::Spawn {
            command: command.to_string(),
            message: e.to_string(),
        })?;

        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input.as_bytes())?;
        }

        let status = CommandStatus::from(child.wait()?);
        debug!(command = %command, code = status.code(), "Shell command finished");
        Ok(status)
    }
}

/// ssh コマンドライン: `ssh -t [-p port] [user@]host <command>`
pub fn ssh_command(server: &ServerSpec, command: &str) -> String {
    format!(
        "ssh -t{} {} {}",
        port_flag(server),
        shell_escape(&server.ssh_target()),
        shell_escape(command)
    )
}

/// スクリプトを標準入力から実行する ssh コマンドライン
pub fn ssh_script_command(server: &ServerSpec) -> String {
    format!(
        "ssh{} {} sh -s",
        port_flag(server),
        shell_escape(&server.ssh_target())
    )
}

/// rsync コマンドライン
pub fn rsync_command(
    server: &ServerSpec,
    source: &str,
    destination: &str,
    ignore_existing: bool,
) -> String {
    let mut cmd = String::from("rsync -chavzP --info=progress2");
    if ignore_existing {
        cmd.push_str(" --ignore-existing");
    }
    cmd.push_str(&format!(" -e 'ssh{}'", port_flag(server)));
    cmd.push(' ');
    cmd.push_str(&shell_escape(source));
    cmd.push(' ');
    cmd.push_str(&shell_escape(&format!(
        "{}:{}",
        server.ssh_target(),
        destination
    )));
    cmd
}

fn port_flag(server: &ServerSpec) -> String {
    server
        .port
        .map(|port| format!(" -p {}", port))
        .unwrap_or_default()
}

/// ssh によるリモート実行
pub struct SshRemote<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> SshRemote<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl RemoteExecutor for SshRemote<'_> {
    fn run_remote(&self, server: &ServerSpec, command: &str) -> Result<CommandStatus> {
        debug!(host = %server.host, command = %command, "Running remote command");
        self.runner.run(&ssh_command(server, command), None)
    }

    fn run_remote_script(&self, server: &ServerSpec, script: &str) -> Result<CommandStatus> {
        debug!(host = %server.host, "Running remote script");
        self.runner.run(&ssh_script_command(server), Some(script))
    }
}

/// rsync によるファイル転送
pub struct RsyncTransfer<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> RsyncTransfer<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl FileTransfer for RsyncTransfer<'_> {
    fn upload(
        &self,
        server: &ServerSpec,
        source: &str,
        destination: &str,
        ignore_existing: bool,
    ) -> Result<CommandStatus> {
        debug!(
            host = %server.host,
            source = %source,
            destination = %destination,
            ignore_existing,
            "Uploading"
        );
        self.runner.run(
            &rsync_command(server, source, destination, ignore_existing),
            None,
        )
    }
}

/// パイプラインが使う実行系一式
#[derive(Clone, Copy)]
pub struct Executors<'a> {
    pub local: &'a dyn CommandRunner,
    pub remote: &'a dyn RemoteExecutor,
    pub transfer: &'a dyn FileTransfer,
}

impl<'a> Executors<'a> {
    /// ローカルコマンドを実行し、失敗ならエラー
    pub fn local(&self, command: &str) -> Result<()> {
        self.local.run(command, None)?.check(command)
    }

    /// リモートコマンドを実行し、失敗ならエラー
    pub fn remote(&self, server: &ServerSpec, command: &str) -> Result<()> {
        self.remote
            .run_remote(server, command)?
            .check(&ssh_command(server, command))
    }

    /// アップロードし、失敗ならエラー
    pub fn upload(
        &self,
        server: &ServerSpec,
        source: &str,
        destination: &str,
        ignore_existing: bool,
    ) -> Result<()> {
        self.transfer
            .upload(server, source, destination, ignore_existing)?
            .check(&rsync_command(server, source, destination, ignore_existing))
    }
}
