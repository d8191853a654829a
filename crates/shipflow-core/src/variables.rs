//! 変数ストア
//!
//! パスやコマンドでは `$NAME`、ファイル内容では `${NAME}` を展開します。
//! 未定義の変数はエラーにせずそのまま残します（`$(uname -s)` のような
//! シェル側の記法を壊さないため）。

use crate::error::{ConfigError, Result};
use crate::model::Project;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

/// `$NAME` トークン。名前は最長一致なので `$VERSIONING` が `$VERSION` に誤爆しない
static PATH_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Z_][A-Z0-9_]*)").expect("valid path token regex"));

/// `${NAME}` トークン
static CONTENT_TOKEN_BYTES: LazyLock<regex::bytes::Regex> = LazyLock::new(|| {
    regex::bytes::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid content token regex")
});

static VARIABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").expect("valid variable name regex"));

/// 変数名として有効か（`[A-Z_][A-Z0-9_]*`）
pub fn is_variable_name(name: &str) -> bool {
    VARIABLE_NAME.is_match(name)
}

/// 変数名 → 値 のフラットなマップ
///
/// 初期化フェーズでのみ書き込み、各ステージには `&VariableStore` として渡す。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableStore {
    vars: BTreeMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 選択されたサーバー向けの変数ストアを構築（プロセス環境変数込み）
    ///
    /// UTF-8 でない環境変数は名前・値のどちらかでも無視する。
    pub fn for_server(project: &Project, server_name: &str) -> Result<Self> {
        let env = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)));
        Self::for_server_with_env(project, server_name, env)
    }

    /// 環境変数を明示して変数ストアを構築
    ///
    /// 上書き順序（後勝ち）:
    /// 1. グローバル変数
    /// 2. ビルトイン: SERVER_HOST, SERVER_NAME, VERSION, ENV
    /// 3. サーバー固有の変数
    /// 4. ビルトイン: DESTINATION_DIR, TEMP_DIR, TEMP_ENVIRONMENT_DIR
    /// 5. プロセス環境変数
    pub fn for_server_with_env<I>(project: &Project, server_name: &str, env: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let server = project.server(server_name)?;
        let layout = project.temp_layout();
        let mut store = Self::new();

        store.extend(project.variables.clone())?;

        store.insert("SERVER_HOST", server.host.clone())?;
        store.insert("SERVER_NAME", server_name)?;
        store.insert("VERSION", server.version.clone())?;
        store.insert("ENV", server.env.clone())?;

        store.extend(server.variables.clone())?;

        store.insert("DESTINATION_DIR", project.destination_dir_for(server))?;
        store.insert("TEMP_DIR", layout.root.to_string_lossy())?;
        store.insert(
            "TEMP_ENVIRONMENT_DIR",
            layout.environment.to_string_lossy(),
        )?;

        store.extend_from_env(env);

        debug!(
            server = %server_name,
            variable_count = store.len(),
            "Variable store initialized"
        );
        Ok(store)
    }

    /// 変数を設定（名前を検証）
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !is_variable_name(&name) {
            return Err(ConfigError::InvalidVariableName(name));
        }
        self.vars.insert(name, value.into());
        Ok(())
    }

    /// 複数の変数を設定
    pub fn extend<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in vars {
            self.insert(name, value)?;
        }
        Ok(())
    }

    /// プロセス環境変数を取り込む（変数名として無効なものは無視）
    pub fn extend_from_env<I>(&mut self, env: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in env {
            if is_variable_name(&name) {
                self.vars.insert(name, value);
            } else {
                debug!(name = %name, "Skipping environment variable with unsupported name");
            }
        }
    }

    /// 1変数を追加した派生ストアを作る（元のストアは変更しない）
    pub fn with_overlay(&self, name: &str, value: impl Into<String>) -> Result<Self> {
        let mut derived = self.clone();
        derived.insert(name, value)?;
        Ok(derived)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(|v| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// パス・コマンド用: `$NAME` を展開
    pub fn resolve_path(&self, s: &str) -> String {
        PATH_TOKEN
            .replace_all(s, |caps: &regex::Captures| match self.vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// ファイル内容用: `${NAME}` を展開
    ///
    /// 文字列向けの薄いラッパーで、置換は `resolve_content_bytes` と同じ処理。
    /// 値はすべて UTF-8 なので、UTF-8 の入力からは UTF-8 の結果が得られる。
    pub fn resolve_content(&self, s: &str) -> String {
        String::from_utf8_lossy(&self.resolve_content_bytes(s.as_bytes())).into_owned()
    }

    /// ファイル内容用のバイト列版（UTF-8 でない内容もそのまま保つ）
    pub fn resolve_content_bytes<'a>(&self, content: &'a [u8]) -> Cow<'a, [u8]> {
        CONTENT_TOKEN_BYTES.replace_all(content, |caps: &regex::bytes::Captures| {
            match std::str::from_utf8(&caps[1])
                .ok()
                .and_then(|name| self.vars.get(name))
            {
                Some(value) => value.as_bytes().to_vec(),
                None => caps[0].to_vec(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServerSpec;
    use std::path::PathBuf;

    fn store(pairs: &[(&str, &str)]) -> VariableStore {
        let mut store = VariableStore::new();
        store
            .extend(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())))
            .unwrap();
        store
    }

    fn project() -> Project {
        let mut project = Project {
            name: "projectname".to_string(),
            temp_dir: PathBuf::from("/tmp/projectname-deploy-tmp"),
            destination_dir: "projectname".to_string(),
            ..Default::default()
        };
        project
            .variables
            .insert("DOCKER_PROJECT_NAME".to_string(), "projectname".to_string());
        project.variables.insert("SUDO".to_string(), "sudo".to_string());
        project
            .variables
            .insert("VERSION".to_string(), "global".to_string());

        let mut server = ServerSpec {
            host: "projectname-prod".to_string(),
            version: "1.2.3".to_string(),
            env: "prod".to_string(),
            ..Default::default()
        };
        server.variables.insert("SUDO".to_string(), String::new());
        server
            .variables
            .insert("DOMAIN".to_string(), "projectname.com".to_string());
        project.servers.insert("prod".to_string(), server);
        project
    }

    #[test]
    fn test_resolve_path_basic() {
        let vars = store(&[("VERSION", "1.0.0"), ("ENV", "prod")]);
        assert_eq!(
            vars.resolve_path("config/config_$ENV.yml"),
            "config/config_prod.yml"
        );
        assert_eq!(vars.resolve_path("app:$VERSION"), "app:1.0.0");
    }

    #[test]
    fn test_resolve_path_respects_token_boundaries() {
        let vars = store(&[("VERSION", "1.0.0")]);
        // $VERSIONING は別の（未定義の）変数
        assert_eq!(vars.resolve_path("$VERSIONING-$VERSION"), "$VERSIONING-1.0.0");

        let vars = store(&[("VERSION", "1.0.0"), ("VERSIONING", "semver")]);
        assert_eq!(vars.resolve_path("$VERSIONING-$VERSION"), "semver-1.0.0");
    }

    #[test]
    fn test_resolve_path_unknown_left_untouched() {
        let vars = store(&[("SUDO", "sudo")]);
        let cmd = r#"$SUDO curl -L "https://example.com/compose-$(uname -s)-$(uname -m)" -o $TARGET"#;
        assert_eq!(
            vars.resolve_path(cmd),
            r#"sudo curl -L "https://example.com/compose-$(uname -s)-$(uname -m)" -o $TARGET"#
        );
    }

    #[test]
    fn test_resolve_path_ignores_braced_tokens() {
        let vars = store(&[("DOMAIN", "example.com")]);
        assert_eq!(vars.resolve_path("${DOMAIN}/$DOMAIN"), "${DOMAIN}/example.com");
    }

    #[test]
    fn test_resolve_path_values_are_not_rescanned() {
        let vars = store(&[("A", "$B"), ("B", "oops")]);
        assert_eq!(vars.resolve_path("$A"), "$B");
    }

    #[test]
    fn test_resolve_content() {
        let vars = store(&[("DOMAIN", "example.com"), ("PORT", "8080")]);
        let content = "server_name ${DOMAIN};\nlisten ${PORT};\nset $host ${UNKNOWN};\n";
        assert_eq!(
            vars.resolve_content(content),
            "server_name example.com;\nlisten 8080;\nset $host ${UNKNOWN};\n"
        );
    }

    #[test]
    fn test_resolve_content_leaves_dollar_names() {
        // nginx / Makefile の $VAR はファイル内容では展開しない
        let vars = store(&[("HOST", "example.com")]);
        assert_eq!(vars.resolve_content("proxy $HOST;"), "proxy $HOST;");
    }

    #[test]
    fn test_resolve_content_idempotent() {
        let vars = store(&[("DOMAIN", "example.com")]);
        let once = vars.resolve_content("host=${DOMAIN} path=$PATH");
        let twice = vars.resolve_content(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_resolve_content_matches_bytes_form() {
        let vars = store(&[("DOMAIN", "例え.jp")]);
        let content = "server_name ${DOMAIN}; # ${MISSING} $DOMAIN";
        assert_eq!(
            vars.resolve_content(content).as_bytes(),
            &vars.resolve_content_bytes(content.as_bytes())[..]
        );
        assert_eq!(
            vars.resolve_content(content),
            "server_name 例え.jp; # ${MISSING} $DOMAIN"
        );
    }

    #[test]
    fn test_resolve_content_bytes_non_utf8() {
        let vars = store(&[("NAME", "world")]);
        let mut content = vec![0xff, 0xfe];
        content.extend_from_slice(b"hello ${NAME}");
        let resolved = vars.resolve_content_bytes(&content);
        assert_eq!(&resolved[..2], &[0xff, 0xfe]);
        assert_eq!(&resolved[2..], b"hello world");
    }

    #[test]
    fn test_insert_rejects_invalid_names() {
        let mut vars = VariableStore::new();
        assert!(vars.insert("lowercase", "x").is_err());
        assert!(vars.insert("1ABC", "x").is_err());
        assert!(vars.insert("_OK_1", "x").is_ok());
    }

    #[test]
    fn test_for_server_precedence() {
        let project = project();
        let env = vec![
            ("DOMAIN".to_string(), "from-env.com".to_string()),
            ("lower_case".to_string(), "skipped".to_string()),
        ];
        let vars = VariableStore::for_server_with_env(&project, "prod", env).unwrap();

        // ビルトインはグローバル変数を上書きする
        assert_eq!(vars.get("VERSION"), Some("1.2.3"));
        assert_eq!(vars.get("ENV"), Some("prod"));
        assert_eq!(vars.get("SERVER_NAME"), Some("prod"));
        assert_eq!(vars.get("SERVER_HOST"), Some("projectname-prod"));
        // サーバー変数はグローバル変数を上書きする
        assert_eq!(vars.get("SUDO"), Some(""));
        // 環境変数はサーバー変数を上書きする
        assert_eq!(vars.get("DOMAIN"), Some("from-env.com"));
        assert_eq!(vars.get("lower_case"), None);

        assert_eq!(vars.get("DESTINATION_DIR"), Some("projectname"));
        assert_eq!(vars.get("TEMP_DIR"), Some("/tmp/projectname-deploy-tmp"));
        assert_eq!(
            vars.get("TEMP_ENVIRONMENT_DIR"),
            Some("/tmp/projectname-deploy-tmp/environment")
        );
        assert_eq!(vars.get("DOCKER_PROJECT_NAME"), Some("projectname"));
    }

    #[test]
    fn test_for_server_reads_process_env() {
        let project = project();
        temp_env::with_var("SHIPFLOW_TEST_DOMAIN_OVERRIDE", Some("env-value"), || {
            let vars = VariableStore::for_server(&project, "prod").unwrap();
            assert_eq!(vars.get("SHIPFLOW_TEST_DOMAIN_OVERRIDE"), Some("env-value"));
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_for_server_skips_non_utf8_env() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let project = project();
        let invalid = OsStr::from_bytes(&[0x66, 0x6f, 0xff]);
        temp_env::with_vars(
            [
                ("SHIPFLOW_TEST_INVALID_VALUE", Some(invalid)),
                ("SHIPFLOW_TEST_VALID_VALUE", Some(OsStr::new("ok"))),
            ],
            || {
                let vars = VariableStore::for_server(&project, "prod").unwrap();
                assert_eq!(vars.get("SHIPFLOW_TEST_INVALID_VALUE"), None);
                assert_eq!(vars.get("SHIPFLOW_TEST_VALID_VALUE"), Some("ok"));
            },
        );
    }

    #[test]
    fn test_for_server_unknown_server() {
        let project = project();
        let result = VariableStore::for_server_with_env(&project, "staging", Vec::new());
        assert!(matches!(result, Err(ConfigError::ServerNotFound { .. })));
    }

    #[test]
    fn test_with_overlay_keeps_original() {
        let vars = store(&[("VERSION", "1.0.0")]);
        let derived = vars.with_overlay("DOCKERFILE_DIR", "docker/api").unwrap();
        assert_eq!(derived.get("DOCKERFILE_DIR"), Some("docker/api"));
        assert_eq!(vars.get("DOCKERFILE_DIR"), None);
    }
}
