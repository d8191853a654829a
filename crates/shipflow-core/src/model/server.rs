//! サーバー定義

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// デプロイ先サーバー定義
///
/// KDL形式：
/// ```kdl
/// server "dev" {
///     host "projectname-dev"
///     user "deploy"
///     port 2222
///     version "0.0.1"
///     env "dev"
///     destination-dir "projectname"
///     variables {
///         DOMAIN "projectname.local"
///     }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSpec {
    pub host: String,
    pub port: Option<u16>,
    pub user: Option<String>,
    /// デプロイするバージョン（VERSION 変数）
    pub version: String,
    /// 環境名（ENV 変数）
    pub env: String,
    pub destination_dir: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl ServerSpec {
    /// SSH/rsync の接続先（[user@]host）
    pub fn ssh_target(&self) -> String {
        match self.user.as_deref() {
            Some(user) if !user.is_empty() => format!("{}@{}", user, self.host),
            _ => self.host.clone(),
        }
    }
}
