//! リモートの古いイメージタグの削除
//!
//! タグ一覧の取得・絞り込み・削除は 1 本のシェルスクリプトとして
//! 1 回の ssh 接続で実行します。スクリプトへの埋め込みは
//! `render_cleanup_script` の 3 つのプレースホルダーのみで、値はすべて
//! シェルエスケープされます。

use crate::error::Result;
use crate::executor::Executors;
use crate::shell::shell_escape;
use shipflow_core::{
    ContainerSpec, ServerSpec, VariableStore, glob_to_regex, image_reference,
    split_image_tag,
};
use tracing::{debug, info};

const CLEANUP_SCRIPT_TEMPLATE: &str = r#"image=@IMAGE@
pattern=@PATTERN@
keep=@KEEP@

tags=$(docker images "$image" --format '{{.Tag}}') || exit 1
tags=$(printf '%s\n' "$tags" | grep -v -x -e '<none>' -e '' | sort -V -r)
if [ -n "$pattern" ]; then
    tags=$(printf '%s\n' "$tags" | grep -E -e "$pattern")
fi
if [ -z "$tags" ]; then
    echo "No matching tags for $image"
    exit 0
fi

candidates=$(printf '%s\n' "$tags" | tail -n +$((keep + 1)))
if [ -z "$candidates" ]; then
    echo "Nothing to remove for $image (keeping $keep)"
    exit 0
fi

in_use=$(docker ps -a --format '{{.Image}}')
printf '%s\n' "$candidates" | while IFS= read -r tag; do
    ref="$image:$tag"
    if printf '%s\n' "$in_use" | grep -F -x -q -e "$ref"; then
        echo "Skipping $ref (in use)"
        continue
    fi
    if docker rmi "$ref" >/dev/null 2>&1; then
        echo "Removed $ref"
    else
        echo "Failed to remove $ref"
    fi
done
exit 0
"#;

/// クリーンアップスクリプトを生成
///
/// `pattern` は正規表現（`grep -E`）。None なら全タグが対象。
pub fn render_cleanup_script(image: &str, pattern: Option<&str>, keep: usize) -> String {
    CLEANUP_SCRIPT_TEMPLATE
        .replace("@IMAGE@", &shell_escape(image))
        .replace("@PATTERN@", &shell_escape(pattern.unwrap_or("")))
        .replace("@KEEP@", &keep.to_string())
}

/// コンテナの保持ポリシーに従ってリモートの古いタグを削除
///
/// `cleanup-old` が無効なら何もしない。戻り値は実行したかどうか。
pub fn cleanup(
    exec: &Executors<'_>,
    server: &ServerSpec,
    vars: &VariableStore,
    container: &ContainerSpec,
) -> Result<bool> {
    let policy = &container.retention;
    if !policy.cleanup_old {
        debug!(container = %container.name, "Retention cleanup disabled");
        return Ok(false);
    }

    let reference = image_reference(
        &vars.resolve_path(&container.registry),
        &vars.resolve_path(&container.name),
    );
    let (image, _) = split_image_tag(&reference);
    let pattern = policy
        .cleanup_pattern
        .as_deref()
        .map(|glob| glob_to_regex(&vars.resolve_path(glob)));

    info!(
        image = %image,
        pattern = ?pattern,
        keep_versions = policy.keep_versions,
        "Cleaning up old image tags"
    );

    let script = render_cleanup_script(image, pattern.as_deref(), policy.keep_versions);
    exec.remote
        .run_remote_script(server, &script)?
        .check(&format!("retention cleanup for {}", image))?;
    Ok(true)
}
