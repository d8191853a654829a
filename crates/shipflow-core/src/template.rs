//! 環境ファイルのテンプレート展開
//!
//! File Spec ごとにソースを work-dir からステージングツリーへコピーし、
//! 必要なら `${NAME}` を展開します。

use crate::error::{ConfigError, Result};
use crate::model::FileSpec;
use crate::variables::VariableStore;
use regex::RegexSet;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// テンプレート展開の結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateReport {
    /// そのままコピーしたファイル（展開先パス）
    pub copied: Vec<PathBuf>,
    /// 変数展開して書き出したファイル（展開先パス）
    pub substituted: Vec<PathBuf>,
    /// 見つからなかったソース
    pub missing: Vec<PathBuf>,
}

impl TemplateReport {
    pub fn file_count(&self) -> usize {
        self.copied.len() + self.substituted.len()
    }
}

/// テンプレートエンジン
pub struct TemplateEngine<'a> {
    vars: &'a VariableStore,
    work_dir: PathBuf,
    patterns: RegexSet,
    dry_run: bool,
}

impl<'a> TemplateEngine<'a> {
    /// `patterns` はディレクトリ内で変数展開の対象にするファイル名の正規表現
    pub fn new(
        vars: &'a VariableStore,
        work_dir: impl Into<PathBuf>,
        patterns: &[String],
    ) -> Result<Self> {
        let patterns = RegexSet::new(patterns).map_err(|e| ConfigError::InvalidPattern {
            pattern: patterns.join(", "),
            message: e.to_string(),
        })?;
        Ok(Self {
            vars,
            work_dir: work_dir.into(),
            patterns,
            dry_run: false,
        })
    }

    /// ドライランでは何も書き込まない
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// ファイル名がパターンに一致するか（ベース名で判定）
    pub fn matches_pattern(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.patterns.is_match(name))
    }

    /// File Spec をすべて `dest_root` 配下に展開する
    ///
    /// ソースが見つからないものは警告してスキップし、残りは処理を続ける。
    #[tracing::instrument(skip(self, files, dest_root), fields(dest_root = %dest_root.display(), file_count = files.len()))]
    pub fn render(&self, files: &[FileSpec], dest_root: &Path) -> Result<TemplateReport> {
        let mut report = TemplateReport::default();

        for spec in files {
            let source = self.work_dir.join(self.vars.resolve_path(&spec.path));
            let destination = dest_root.join(self.vars.resolve_path(&spec.env_path));

            if self.dry_run {
                info!(
                    source = %source.display(),
                    destination = %destination.display(),
                    replace_vars = spec.replace_vars,
                    "[dry-run] Would copy"
                );
                continue;
            }

            if !source.exists() {
                warn!(source = %source.display(), "Source file not found, skipping");
                report.missing.push(source);
                continue;
            }

            if source.is_dir() {
                let mut visited = HashSet::new();
                self.copy_dir(
                    &source,
                    &destination,
                    spec.replace_vars,
                    &mut visited,
                    &mut report,
                )?;
            } else {
                ensure_parent(&destination)?;
                if spec.replace_vars {
                    self.write_substituted(&source, &destination)?;
                    report.substituted.push(destination);
                } else {
                    copy_file(&source, &destination)?;
                    report.copied.push(destination);
                }
            }
        }

        info!(
            copied = report.copied.len(),
            substituted = report.substituted.len(),
            missing = report.missing.len(),
            "Environment files rendered"
        );
        Ok(report)
    }

    /// ディレクトリを再帰的にコピー（既存の展開先にはマージ）
    fn copy_dir(
        &self,
        source: &Path,
        destination: &Path,
        replace_vars: bool,
        visited: &mut HashSet<PathBuf>,
        report: &mut TemplateReport,
    ) -> Result<()> {
        let canonical = source.canonicalize().map_err(|e| io_error(source, e))?;
        if !visited.insert(canonical.clone()) {
            warn!(dir = %canonical.display(), "Symlink loop detected, skipping");
            return Ok(());
        }

        std::fs::create_dir_all(destination).map_err(|e| io_error(destination, e))?;

        let mut entries = std::fs::read_dir(source)
            .map_err(|e| io_error(source, e))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| io_error(source, e))?;
        entries.sort();

        for path in entries {
            let Some(file_name) = path.file_name() else {
                continue;
            };
            let target = destination.join(file_name);

            if path.is_dir() {
                self.copy_dir(&path, &target, replace_vars, visited, report)?;
            } else if replace_vars && self.matches_pattern(&path) {
                self.write_substituted(&path, &target)?;
                report.substituted.push(target);
            } else {
                copy_file(&path, &target)?;
                report.copied.push(target);
            }
        }

        Ok(())
    }

    fn write_substituted(&self, source: &Path, destination: &Path) -> Result<()> {
        let content = std::fs::read(source).map_err(|e| io_error(source, e))?;
        let resolved = self.vars.resolve_content_bytes(&content);
        std::fs::write(destination, resolved.as_ref()).map_err(|e| io_error(destination, e))?;
        debug!(
            source = %source.display(),
            destination = %destination.display(),
            "Substituted variables"
        );
        Ok(())
    }
}

fn copy_file(source: &Path, destination: &Path) -> Result<()> {
    std::fs::copy(source, destination).map_err(|e| io_error(source, e))?;
    debug!(
        source = %source.display(),
        destination = %destination.display(),
        "Copied"
    );
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> ConfigError {
    ConfigError::IoError {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
