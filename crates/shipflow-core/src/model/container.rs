//! コンテナ定義

use serde::{Deserialize, Serialize};

/// 保持するバージョン数（デフォルト）
pub const DEFAULT_KEEP_VERSIONS: usize = 3;

/// コンテナ（イメージ）定義
///
/// KDL形式：
/// ```kdl
/// container "projectname-api:$VERSION" {
///     registry "registry.projectname.com:5000"
///     dockerfile "docker/api/Dockerfile"
///     build-path "docker/api"
///     build-args "VERSION=$VERSION" "ENV=$ENV"
///     archive-name "projectname-api.tar"
///     cleanup-old #true
///     keep-versions 5
///     cleanup-pattern "*-prod"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// イメージ名とタグ（$NAME 展開あり）
    pub name: String,
    /// レジストリ（空ならイメージ名のみで参照）
    #[serde(default)]
    pub registry: String,
    /// work-dir からの相対パス
    #[serde(default)]
    pub dockerfile: String,
    /// 空または "./" なら Dockerfile のディレクトリ
    #[serde(default)]
    pub build_path: String,
    #[serde(default)]
    pub build_args: Vec<String>,
    #[serde(default)]
    pub build_contexts: Vec<String>,
    /// 指定時はレジストリへの push ではなく save/load で転送する
    pub archive_name: Option<String>,
    /// 未指定ならグローバル設定に従う
    pub buildx: Option<bool>,
    pub platform: Option<String>,
    pub docker_host: Option<String>,
    /// アーカイブを環境アーカイブとは別に転送する
    #[serde(default)]
    pub deploy_separately: bool,
    /// 個別転送前に古いアーカイブを削除する
    #[serde(default)]
    pub remove_old: bool,
    /// 転送先に同名ファイルがあればスキップする
    #[serde(default)]
    pub ignore_existing: bool,
    #[serde(default)]
    pub retention: RetentionPolicy,
}

/// リモートの古いイメージタグの保持ポリシー
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub cleanup_old: bool,
    pub keep_versions: usize,
    /// glob 形式（例: "*-prod"）。未指定なら全タグが対象
    pub cleanup_pattern: Option<String>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            cleanup_old: false,
            keep_versions: DEFAULT_KEEP_VERSIONS,
            cleanup_pattern: None,
        }
    }
}

/// グローバルな Docker 設定
///
/// KDL形式：
/// ```kdl
/// docker {
///     host "ssh://user@remote-docker-host"
///     buildx #false
///     platform "linux/amd64"
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerSettings {
    pub host: Option<String>,
    #[serde(default)]
    pub buildx: bool,
    pub platform: Option<String>,
}

impl ContainerSpec {
    /// buildx を使うか（グローバル・コンテナのどちらかで有効なら使う）
    pub fn use_buildx(&self, docker: &DockerSettings) -> bool {
        docker.buildx || self.buildx.unwrap_or(false)
    }

    /// プラットフォーム（コンテナ設定が優先）
    pub fn effective_platform<'a>(&'a self, docker: &'a DockerSettings) -> Option<&'a str> {
        non_empty(self.platform.as_deref()).or(non_empty(docker.platform.as_deref()))
    }

    /// DOCKER_HOST（コンテナ設定が優先、未展開）
    pub fn effective_docker_host<'a>(&'a self, docker: &'a DockerSettings) -> Option<&'a str> {
        non_empty(self.docker_host.as_deref()).or(non_empty(docker.host.as_deref()))
    }
}

/// レジストリとイメージ名から完全なイメージ参照を組み立てる
pub fn image_reference(registry: &str, image: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.is_empty() {
        image.to_string()
    } else {
        format!("{}/{}", registry, image)
    }
}

/// "image:tag" をイメージとタグに分離（レジストリのポート番号を考慮）
pub fn split_image_tag(image: &str) -> (&str, Option<&str>) {
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[name_start..].rfind(':') {
        Some(pos) => {
            let split = name_start + pos;
            (&image[..split], Some(&image[split + 1..]))
        }
        None => (image, None),
    }
}

/// glob 形式のタグパターンを正規表現に変換（`*` → `.*`, `?` → `.`、他はエスケープ）
///
/// 結果は Rust の regex と `grep -E` の両方で同じ意味になる。
pub fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push('^');
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '.' | '[' | ']' | '{' | '}' | '(' | ')' | '\\' | '+' | '^' | '$' | '|' => {
                regex.push('\\');
                regex.push(c);
            }
            _ => regex.push(c),
        }
    }
    regex.push('$');
    regex
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
