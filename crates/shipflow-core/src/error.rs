use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("無効な正規表現 '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("無効な変数名: {0}（[A-Z_][A-Z0-9_]* である必要があります）")]
    InvalidVariableName(String),

    #[error(
        "設定ファイルが見つかりません\n探索開始位置: {0}\nヒント: ship.kdl を含むディレクトリで実行するか、--file / SHIPFLOW_CONFIG で指定してください"
    )]
    ConfigNotFound(PathBuf),

    #[error("サーバー '{name}' は設定に存在しません（利用可能: {available}）")]
    ServerNotFound { name: String, available: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
