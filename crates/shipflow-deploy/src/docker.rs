//! Docker コマンドの組み立て
//!
//! 設定上のコンテナ定義は変更せず、ステージごとに変数を解決した
//! `ResolvedContainer` を作ってコマンドを組み立てます。

use crate::error::Result;
use crate::shell::{shell_escape, shell_escape_path};
use regex::Regex;
use shipflow_core::{ContainerSpec, DockerSettings, VariableStore, image_reference};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static VARIABLE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Z_][A-Z0-9_]*").expect("valid variable token regex"));

/// 変数解決済みのコンテナ定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContainer {
    /// "image:tag"
    pub name: String,
    pub registry: String,
    /// "registry/image:tag"（レジストリ未指定なら "image:tag"）
    pub reference: String,
    pub dockerfile: PathBuf,
    pub build_path: PathBuf,
    pub build_args: Vec<String>,
    pub build_contexts: Vec<String>,
    pub archive_name: Option<String>,
    pub buildx: bool,
    pub platform: Option<String>,
    pub docker_host: Option<String>,
}

impl ResolvedContainer {
    /// コンテナ定義を変数ストアで解決する（純粋関数）
    pub fn resolve(
        spec: &ContainerSpec,
        docker: &DockerSettings,
        work_dir: &Path,
        vars: &VariableStore,
    ) -> Result<Self> {
        let name = vars.resolve_path(&spec.name);
        let registry = vars.resolve_path(&spec.registry);
        let reference = image_reference(&registry, &name);

        let dockerfile_rel = vars.resolve_path(&spec.dockerfile);
        let dockerfile_dir = Path::new(&dockerfile_rel)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let build_vars = vars.with_overlay("DOCKERFILE_DIR", dockerfile_dir)?;

        let dockerfile = work_dir.join(&dockerfile_rel);
        let build_path = match spec.build_path.as_str() {
            "" | "./" | "." => dockerfile
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| work_dir.to_path_buf()),
            path => work_dir.join(vars.resolve_path(path)),
        };

        Ok(Self {
            name,
            registry,
            reference,
            dockerfile,
            build_path,
            build_args: spec
                .build_args
                .iter()
                .map(|a| build_vars.resolve_path(a))
                .collect(),
            build_contexts: spec
                .build_contexts
                .iter()
                .map(|c| build_vars.resolve_path(c))
                .collect(),
            archive_name: spec.archive_name.as_deref().map(|a| vars.resolve_path(a)),
            buildx: spec.use_buildx(docker),
            platform: spec.effective_platform(docker).map(str::to_string),
            docker_host: spec
                .effective_docker_host(docker)
                .map(|h| vars.resolve_path(h)),
        })
    }

    /// `DOCKER_HOST=... ` プレフィックス
    fn host_prefix(&self) -> String {
        match self.docker_host.as_deref() {
            Some(host) if !host.is_empty() => format!("DOCKER_HOST={} ", shell_escape(host)),
            _ => String::new(),
        }
    }

    /// docker build コマンド
    pub fn build_command(&self) -> String {
        let mut cmd = self.host_prefix();
        cmd.push_str("docker ");
        if self.buildx {
            cmd.push_str("buildx ");
        }
        cmd.push_str("build");
        if let Some(platform) = &self.platform {
            cmd.push_str(&format!(" --platform {}", shell_escape(platform)));
        }
        for arg in &self.build_args {
            cmd.push_str(&format!(" --build-arg {}", shell_escape(arg)));
        }
        for context in &self.build_contexts {
            cmd.push_str(&format!(" --build-context {}", shell_escape(context)));
        }
        cmd.push_str(&format!(
            " -t {} -f {} {}",
            shell_escape(&self.reference),
            shell_escape(&self.dockerfile.to_string_lossy()),
            shell_escape(&self.build_path.to_string_lossy()),
        ));
        cmd
    }

    /// docker push コマンド
    pub fn push_command(&self) -> String {
        format!(
            "{}docker push {}",
            self.host_prefix(),
            shell_escape(&self.reference)
        )
    }

    /// docker save コマンド（archive-name がなければ None）
    pub fn save_command(&self, dir: &Path) -> Option<String> {
        let archive_name = self.archive_name.as_deref()?;
        let output = dir.join(archive_name);
        Some(format!(
            "{}docker save {} -o {}",
            self.host_prefix(),
            shell_escape(&self.reference),
            shell_escape(&output.to_string_lossy())
        ))
    }

    /// リモートの docker load コマンド（archive-name がなければ None）
    pub fn load_command(&self, destination_dir: &str) -> Option<String> {
        let archive_name = self.archive_name.as_deref()?;
        Some(format!(
            "cd {} && docker load -i {}",
            shell_escape_path(destination_dir),
            shell_escape(archive_name)
        ))
    }
}

/// 個別転送するアーカイブの古い版を削除するリモートコマンド
///
/// archive-name のテンプレート中の `$NAME` を `*` に置き換えた glob に一致し、
/// `keep`（今回デプロイする全アーカイブ名）に含まれないファイルを削除する。
/// glob が他のファイルまで拾わないよう、変数より前に固定の接頭辞がない
/// テンプレートでは None。
pub fn stale_archive_command(
    template: &str,
    keep: &[String],
    destination_dir: &str,
) -> Option<String> {
    let first = VARIABLE_TOKEN.find(template)?;
    if first.start() == 0 {
        return None;
    }

    let mut glob = String::new();
    let mut last = 0;
    for token in VARIABLE_TOKEN.find_iter(template) {
        let literal = &template[last..token.start()];
        if !literal.is_empty() {
            glob.push_str(&shell_escape(literal));
        }
        glob.push('*');
        last = token.end();
    }
    let rest = &template[last..];
    if !rest.is_empty() {
        glob.push_str(&shell_escape(rest));
    }

    let remove = if keep.is_empty() {
        "rm -f -- \"$f\"".to_string()
    } else {
        let keep = keep
            .iter()
            .map(|name| shell_escape(name).into_owned())
            .collect::<Vec<_>>()
            .join("|");
        format!("case \"$f\" in {}) ;; *) rm -f -- \"$f\" ;; esac", keep)
    };

    Some(format!(
        "cd {} && for f in {}; do {}; done",
        shell_escape_path(destination_dir),
        glob,
        remove
    ))
}
