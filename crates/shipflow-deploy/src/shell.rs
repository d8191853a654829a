//! シェルコマンド組み立て用のユーティリティ

use std::borrow::Cow;

/// シェルで特別な意味を持たない文字だけならそのまま返す
fn is_shell_safe(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@' | ',' | '+' | '%')
        })
}

/// シェルエスケープ
///
/// 必要な場合のみシングルクォートで囲む。
pub fn shell_escape(s: &str) -> Cow<'_, str> {
    if is_shell_safe(s) {
        Cow::Borrowed(s)
    } else {
        // シングルクォートでラップしてエスケープ
        Cow::Owned(format!("'{}'", s.replace('\'', "'\\''")))
    }
}

/// リモートパス用のシェルエスケープ
///
/// 先頭の `~` / `~/` はホームディレクトリに展開されるようクォートの外に残す。
pub fn shell_escape_path(path: &str) -> Cow<'_, str> {
    match path.strip_prefix("~/") {
        Some("") => Cow::Borrowed("~/"),
        Some(rest) => Cow::Owned(format!("~/{}", shell_escape(rest))),
        None if path == "~" => Cow::Borrowed("~"),
        None => shell_escape(path),
    }
}
