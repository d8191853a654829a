//! デプロイパイプライン
//!
//! 指定されたステップを指定順にそのまま実行します（並べ替えや自動補完はしない）。
//! 外部コマンドはすべて `Executors` 経由で、1 つずつ完了を待って実行されます。

use crate::archive;
use crate::cleanup;
use crate::docker::{ResolvedContainer, stale_archive_command};
use crate::error::{DeployError, Result};
use crate::executor::Executors;
use crate::output;
use crate::shell::{shell_escape, shell_escape_path};
use shipflow_core::{
    BUILTIN_STAGE_NAMES, CommandPlace, Project, ServerSpec, TemplateEngine, TemplateReport,
    VariableStore,
};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// パイプラインのステップ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    BuildEnv,
    Build,
    Push,
    Deploy,
    Run,
    /// ユーザー定義コマンド
    User(String),
}

impl Step {
    /// ステージ未指定時のデフォルト
    pub const DEFAULT: [Step; 4] = [Step::BuildEnv, Step::Build, Step::Push, Step::Deploy];

    /// ステップ名をパース（ユーザー定義コマンドも解決する）
    pub fn parse(name: &str, project: &Project) -> Result<Self> {
        match name {
            "build-env" => Ok(Step::BuildEnv),
            "build" => Ok(Step::Build),
            "push" => Ok(Step::Push),
            "deploy" => Ok(Step::Deploy),
            "run" => Ok(Step::Run),
            other if project.commands.contains_key(other) => Ok(Step::User(other.to_string())),
            other => Err(DeployError::UnknownStage {
                name: other.to_string(),
                available: BUILTIN_STAGE_NAMES
                    .iter()
                    .copied()
                    .chain(project.commands.keys().map(|k| k.as_str()))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// カンマ・空白区切りのステージ指定をパース
    ///
    /// 1 つでも不明なステージがあれば何も実行せずにエラーにする。
    pub fn parse_list<S: AsRef<str>>(args: &[S], project: &Project) -> Result<Vec<Self>> {
        args.iter()
            .flat_map(|arg| {
                arg.as_ref()
                    .split(|c: char| c == ',' || c.is_whitespace())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .map(|name| Step::parse(&name, project))
            .collect()
    }

    pub fn name(&self) -> &str {
        match self {
            Step::BuildEnv => "build-env",
            Step::Build => "build",
            Step::Push => "push",
            Step::Deploy => "deploy",
            Step::Run => "run",
            Step::User(name) => name,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 1 回の実行のコンテキスト
pub struct Pipeline<'a> {
    project: &'a Project,
    server_name: &'a str,
    server: &'a ServerSpec,
    vars: &'a VariableStore,
    exec: Executors<'a>,
    dry_run: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        project: &'a Project,
        server_name: &'a str,
        vars: &'a VariableStore,
        exec: Executors<'a>,
    ) -> Result<Self> {
        let server = project.server(server_name)?;
        Ok(Self {
            project,
            server_name,
            server,
            vars,
            exec,
            dry_run: false,
        })
    }

    /// ドライランではローカルのファイル操作も行わない
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// ステップを順に実行（最初の致命的エラーで中断）
    #[tracing::instrument(skip(self, steps), fields(server = %self.server_name))]
    pub fn run(&self, steps: &[Step]) -> Result<()> {
        for step in steps {
            info!(step = %step, "Running step");
            match step {
                Step::BuildEnv => {
                    self.build_env()?;
                }
                Step::Build => self.build()?,
                Step::Push => self.push()?,
                Step::Deploy => self.deploy()?,
                Step::Run => self.run_command()?,
                Step::User(name) => self.user_command(name)?,
            }
        }
        Ok(())
    }

    /// デプロイ先ディレクトリ（変数展開済み）
    fn destination_dir(&self) -> String {
        self.vars
            .resolve_path(self.project.destination_dir_for(self.server))
    }

    fn resolve_containers(&self) -> Result<Vec<ResolvedContainer>> {
        self.project
            .containers
            .iter()
            .map(|spec| {
                ResolvedContainer::resolve(
                    spec,
                    &self.project.docker,
                    &self.project.work_dir,
                    self.vars,
                )
            })
            .collect()
    }

    /// build-env: ステージングツリーを作り直し、環境ファイルを展開
    pub fn build_env(&self) -> Result<TemplateReport> {
        let layout = self.project.temp_layout();

        output::message("一時ディレクトリを作成 / クリーンアップ");
        ensure_safe_temp_dir(&layout.root, self.project)?;
        if self.dry_run {
            output::dry_run(&format!("rm -rf {}", shell_escape(&layout.root.to_string_lossy())));
        } else {
            if layout.root.exists() {
                std::fs::remove_dir_all(&layout.root)?;
            }
            for dir in [&layout.environment, &layout.containers, &layout.archives] {
                std::fs::create_dir_all(dir)?;
            }
            debug!(temp_dir = %layout.root.display(), "Staging tree recreated");
        }

        output::message("環境ファイルをコピー");
        let engine = TemplateEngine::new(
            self.vars,
            &self.project.work_dir,
            &self.project.replace_vars_patterns,
        )?
        .dry_run(self.dry_run);
        let report = engine.render(&self.project.files, &layout.environment)?;

        for missing in &report.missing {
            output::error(&format!("ファイル / ディレクトリが存在しません: {}", missing.display()));
        }
        if !self.dry_run {
            output::message(&format!(
                "{} ファイルをコピー（うち変数展開 {}）",
                report.file_count(),
                report.substituted.len()
            ));
        }
        Ok(report)
    }

    /// build: 全コンテナをビルド
    pub fn build(&self) -> Result<()> {
        output::message(&format!(
            "v{} を [{}] 向けにビルド開始",
            self.server.version, self.server_name
        ));
        output::message("コンテナをビルド");
        for container in self.resolve_containers()? {
            info!(image = %container.reference, "Building container");
            self.exec.local(&container.build_command())?;
        }
        Ok(())
    }

    /// push: archive-name のないコンテナをレジストリへ push
    pub fn push(&self) -> Result<()> {
        output::message(&format!(
            "v{} のコンテナを [{}] 向けに push 開始",
            self.server.version, self.server_name
        ));
        output::message("コンテナを push");
        for container in self.resolve_containers()? {
            if container.archive_name.is_some() {
                debug!(image = %container.reference, "Skipping push for archived container");
                continue;
            }
            info!(image = %container.reference, "Pushing container");
            self.exec.local(&container.push_command())?;
        }
        Ok(())
    }

    /// deploy: アーカイブを作成・転送・展開し、起動コマンドを実行
    pub fn deploy(&self) -> Result<()> {
        let layout = self.project.temp_layout();
        let destination = self.destination_dir();
        let archive_name = self.vars.resolve_path(&self.project.archive_name);
        let containers = self.resolve_containers()?;

        output::message(&format!(
            "v{} を [{}] へデプロイ開始",
            self.server.version, self.server_name
        ));
        debug!(variables = ?self.vars, "Deploy variables");

        output::message("コンテナをダンプ");
        for (spec, container) in self.project.containers.iter().zip(&containers) {
            let dir = if spec.deploy_separately {
                &layout.containers
            } else {
                &layout.environment
            };
            if let Some(command) = container.save_command(dir) {
                self.exec.local(&command)?;
            }
        }

        output::message("アーカイブを作成");
        let archive_path = layout.archives.join(&archive_name);
        if self.dry_run {
            output::dry_run(&format!(
                "tar -czf {} -C {} .",
                shell_escape(&archive_path.to_string_lossy()),
                shell_escape(&layout.environment.to_string_lossy())
            ));
        } else {
            let size = archive::create_tar_gz(&archive_path, &layout.environment)?;
            info!(archive = %archive_path.display(), bytes = size, "Environment archive created");
        }

        output::message(&format!(
            "デプロイ先サーバーにディレクトリ [{}] を作成",
            destination
        ));
        self.exec.remote(
            self.server,
            &format!("mkdir -p {}", shell_escape_path(&destination)),
        )?;

        output::message("アーカイブをアップロード");
        self.exec.upload(
            self.server,
            &dir_contents(&layout.archives),
            &format!("{}/", destination),
            false,
        )?;

        output::message("アーカイブを展開");
        self.exec.remote(
            self.server,
            &format!(
                "cd {} && tar -xzf {}",
                shell_escape_path(&destination),
                shell_escape(&archive_name)
            ),
        )?;

        let archive_names: Vec<String> = containers
            .iter()
            .filter_map(|c| c.archive_name.clone())
            .collect();

        for (spec, container) in self.project.containers.iter().zip(&containers) {
            let Some(current) = container.archive_name.as_deref() else {
                continue;
            };

            if spec.deploy_separately {
                if spec.remove_old
                    && let Some(template) = spec.archive_name.as_deref()
                    && let Some(command) =
                        stale_archive_command(template, &archive_names, &destination)
                {
                    output::message(&format!("古いアーカイブを削除: {}", template));
                    self.exec.remote(self.server, &command)?;
                }

                output::message(&format!("コンテナアーカイブをアップロード: {}", current));
                self.exec.upload(
                    self.server,
                    &layout.containers.join(current).to_string_lossy(),
                    &format!("{}/", destination),
                    spec.ignore_existing,
                )?;
            }

            if let Some(command) = container.load_command(&destination) {
                output::message(&format!("コンテナをロード: {}", container.reference));
                self.exec.remote(self.server, &command)?;
            }
        }

        for spec in &self.project.containers {
            if !spec.retention.cleanup_old {
                continue;
            }
            output::message(&format!("古いイメージを削除: {}", spec.name));
            if let Err(e) = cleanup::cleanup(&self.exec, self.server, self.vars, spec) {
                warn!(container = %spec.name, error = %e, "Retention cleanup failed");
                output::error(&format!("古いイメージの削除に失敗しました（続行します）: {}", e));
            }
        }

        match &self.project.run_command {
            Some(_) => self.run_command(),
            None => {
                warn!("run-command is not configured, skipping startup");
                output::error("run-command が設定されていないため起動をスキップします");
                Ok(())
            }
        }
    }

    /// run: 起動コマンドをリモートで実行
    pub fn run_command(&self) -> Result<()> {
        let command = self
            .project
            .run_command
            .as_deref()
            .ok_or(DeployError::MissingRunCommand)?;
        output::message("起動");
        self.exec
            .remote(self.server, &self.vars.resolve_path(command))
    }

    /// ユーザー定義コマンド
    pub fn user_command(&self, name: &str) -> Result<()> {
        let command = self
            .project
            .commands
            .get(name)
            .ok_or_else(|| DeployError::UnknownStage {
                name: name.to_string(),
                available: self
                    .project
                    .commands
                    .keys()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        let place = match command.place {
            CommandPlace::Local => "local",
            CommandPlace::Remote => "remote",
        };
        output::message(&format!(
            "ユーザーコマンド開始: {}, {}, server [{}]",
            name, place, self.server_name
        ));

        for line in &command.commands {
            let line = self.vars.resolve_path(line);
            match command.place {
                CommandPlace::Local => self.exec.local(&line)?,
                CommandPlace::Remote => self.exec.remote(self.server, &line)?,
            }
        }
        Ok(())
    }
}

/// rsync でディレクトリの中身を転送するためのパス（末尾 `/`）
fn dir_contents(dir: &Path) -> String {
    let mut path = dir.to_string_lossy().into_owned();
    if !path.ends_with('/') {
        path.push('/');
    }
    path
}

/// 一時ディレクトリの削除でプロジェクトやホームを消さないための確認
///
/// ルート、ホーム、プロジェクトルート・作業ディレクトリそのものかその祖先は拒否する。
fn ensure_safe_temp_dir(dir: &Path, project: &Project) -> Result<()> {
    let unsafe_dir = || DeployError::UnsafeTempDir(dir.to_path_buf());
    if dir.as_os_str().is_empty() {
        return Err(unsafe_dir());
    }

    let absolute = std::path::absolute(dir)?;
    let is_root = absolute.parent().is_none();
    let is_home = dirs::home_dir().is_some_and(|home| home == absolute);
    let contains_project = [&project.root, &project.work_dir]
        .into_iter()
        .filter(|p| !p.as_os_str().is_empty())
        .any(|p| std::path::absolute(p).is_ok_and(|p| p.starts_with(&absolute)));

    if is_root || is_home || contains_project {
        return Err(unsafe_dir());
    }
    Ok(())
}
