//! ユーザー定義コマンド

use serde::{Deserialize, Serialize};

/// 組み込みステージ名（ユーザーコマンド名として使えない）
pub const BUILTIN_STAGE_NAMES: &[&str] = &["build-env", "build", "push", "deploy", "run"];

/// コマンドの実行場所
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandPlace {
    #[default]
    Local,
    Remote,
}

impl CommandPlace {
    /// 文字列からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// ユーザー定義コマンド
///
/// KDL形式：
/// ```kdl
/// command "hello-remote" place="remote" {
///     run "echo \"hello world on server: $SERVER_NAME\""
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommand {
    pub place: CommandPlace,
    #[serde(default)]
    pub commands: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_place_parse() {
        assert_eq!(CommandPlace::parse("local"), Some(CommandPlace::Local));
        assert_eq!(CommandPlace::parse("Remote"), Some(CommandPlace::Remote));
        assert_eq!(CommandPlace::parse("elsewhere"), None);
    }
}
