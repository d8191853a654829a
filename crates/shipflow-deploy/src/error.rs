use shipflow_core::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("コマンドが失敗しました（終了コード {code}）: {command}")]
    CommandFailed { command: String, code: i32 },

    #[error("コマンドを起動できません: {command}\n理由: {message}")]
    Spawn { command: String, message: String },

    #[error("アーカイブの作成に失敗しました: {path}\n理由: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("run-command が設定されていません")]
    MissingRunCommand,

    #[error("不明なステージ: {name}（利用可能: {available}）")]
    UnknownStage { name: String, available: String },

    #[error("一時ディレクトリとして使用できないパスです: {0}")]
    UnsafeTempDir(PathBuf),
}

impl DeployError {
    /// プロセスの終了コード（外部コマンドの失敗はそのコマンドの終了コード）
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::CommandFailed { code, .. } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// ユーザー向けの分かりやすいエラーメッセージ
    pub fn user_message(&self) -> String {
        match self {
            DeployError::MissingRunCommand => "run-command が設定されていません\n\
                 \n\
                 ship.kdl に起動コマンドを追加してください:\n\
                    run-command \"cd $DESTINATION_DIR && docker compose up -d\""
                .to_string(),
            DeployError::UnknownStage { name, available } => {
                format!(
                    "不明なステージ: {}\n\
                     \n\
                     利用可能なステージ: {}",
                    name, available
                )
            }
            _ => format!("{}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
