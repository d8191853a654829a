//! プロジェクト定義

use super::command::UserCommand;
use super::container::{ContainerSpec, DockerSettings};
use super::file::FileSpec;
use super::server::ServerSpec;
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// ディレクトリ内のファイルで変数展開の対象とするファイル名パターン（デフォルト）
pub const DEFAULT_REPLACE_VARS_PATTERNS: &[&str] = &[r"\.conf$", r"\.ya?ml$", "default$"];

/// プロジェクト全体の設定
///
/// パース後は実行中に変更されない。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// 起動時に表示するメッセージ
    pub motd: Option<String>,
    /// 設定ファイルのあるディレクトリ
    pub root: PathBuf,
    /// ローカルパスの基準ディレクトリ
    pub work_dir: PathBuf,
    /// ステージングツリーのルート
    pub temp_dir: PathBuf,
    /// 環境アーカイブのファイル名
    pub archive_name: String,
    /// デプロイ先サーバー上の展開ディレクトリ
    pub destination_dir: String,
    /// デプロイ後・run で実行するリモートコマンド
    pub run_command: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub replace_vars_patterns: Vec<String>,
    #[serde(default)]
    pub docker: DockerSettings,
    /// 宣言順を保持する
    #[serde(default)]
    pub containers: Vec<ContainerSpec>,
    /// 宣言順を保持する
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub commands: BTreeMap<String, UserCommand>,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerSpec>,
}

/// ステージングツリーのレイアウト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempLayout {
    pub root: PathBuf,
    /// テンプレート展開された環境ファイル
    pub environment: PathBuf,
    /// 個別転送するコンテナアーカイブ
    pub containers: PathBuf,
    /// アップロード待ちの環境アーカイブ
    pub archives: PathBuf,
}

impl Project {
    /// サーバー定義を取得
    pub fn server(&self, name: &str) -> Result<&ServerSpec> {
        self.servers
            .get(name)
            .ok_or_else(|| ConfigError::ServerNotFound {
                name: name.to_string(),
                available: self
                    .servers
                    .keys()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    pub fn temp_layout(&self) -> TempLayout {
        TempLayout {
            root: self.temp_dir.clone(),
            environment: self.temp_dir.join("environment"),
            containers: self.temp_dir.join("containers"),
            archives: self.temp_dir.join("archives"),
        }
    }

    /// サーバー固有の destination-dir があればそちらを優先
    pub fn destination_dir_for<'a>(&'a self, server: &'a ServerSpec) -> &'a str {
        server
            .destination_dir
            .as_deref()
            .unwrap_or(&self.destination_dir)
    }

    /// コンテナ関連の処理をすべてスキップする（--skip-containers）
    pub fn without_containers(mut self) -> Self {
        self.containers.clear();
        self
    }
}
