//! 環境ファイル定義

use serde::{Deserialize, Serialize};

/// 環境ファイル定義
///
/// KDL形式：
/// ```kdl
/// file "docker/nginx" env-path="nginx" replace-vars=#true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    /// work-dir からの相対パス（$NAME 展開あり）
    pub path: String,
    /// ステージングツリーの environment/ からの相対パス（$NAME 展開あり）
    pub env_path: String,
    /// ファイル内容の ${NAME} を展開するか
    #[serde(default)]
    pub replace_vars: bool,
}
