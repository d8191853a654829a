//! ShipFlow Deploy
//!
//! ビルド・アーカイブ・転送・リモート実行・イメージ保持の
//! デプロイパイプラインを提供します。

pub mod archive;
pub mod cleanup;
pub mod docker;
pub mod error;
pub mod executor;
pub mod output;
pub mod pipeline;
pub mod shell;

#[cfg(test)]
mod testing;

pub use docker::ResolvedContainer;
pub use error::{DeployError, Result};
pub use executor::{
    CommandRunner, CommandStatus, ExecOptions, Executors, FileTransfer, RemoteExecutor,
    RsyncTransfer, ShellRunner, SshRemote,
};
pub use pipeline::{Pipeline, Step};
