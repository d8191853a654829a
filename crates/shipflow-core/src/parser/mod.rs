//! KDLパーサー
//!
//! ship.kdl をパースして `Project` を生成します。
//! 各ノードタイプのパース処理はモジュールに分離されています。

mod command;
mod container;
mod server;

use command::parse_command;
use container::parse_container;
use server::parse_server;

use crate::error::{ConfigError, Result};
use crate::model::{DEFAULT_REPLACE_VARS_PATTERNS, DockerSettings, FileSpec, Project};
use crate::variables::is_variable_name;
use kdl::{KdlDocument, KdlNode};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 設定ファイルをパースして Project を生成
///
/// プロジェクトルートは設定ファイルのあるディレクトリ
/// （`.shipflow/ship.kdl` の場合はその親）。
pub fn parse_config_file<P: AsRef<Path>>(path: P) -> Result<Project> {
    let path = std::path::absolute(path.as_ref())?;
    let content = fs::read_to_string(&path).map_err(|e| ConfigError::IoError {
        path: path.clone(),
        message: e.to_string(),
    })?;

    let mut root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    if root.file_name().and_then(|n| n.to_str()) == Some(".shipflow")
        && let Some(parent) = root.parent()
    {
        root = parent.to_path_buf();
    }

    debug!(config = %path.display(), root = %root.display(), "Parsing config file");
    parse_config_string(&content, &root)
}

/// KDL文字列をパース
///
/// 相対パスの work-dir / temp-dir は `root` を基準に解決する。
pub fn parse_config_string(content: &str, root: &Path) -> Result<Project> {
    let doc: KdlDocument = content.parse()?;

    let mut project = Project {
        root: root.to_path_buf(),
        ..Default::default()
    };
    let mut name: Option<String> = None;
    let mut work_dir: Option<String> = None;
    let mut temp_dir: Option<String> = None;
    let mut archive_name: Option<String> = None;
    let mut destination_dir: Option<String> = None;
    let mut replace_vars_patterns: Option<Vec<String>> = None;

    for node in doc.nodes() {
        match node.name().value() {
            "project" => {
                name = first_string(node);
            }
            "motd" => {
                project.motd = first_string(node);
            }
            "work-dir" | "work_dir" => {
                work_dir = first_string(node);
            }
            "temp-dir" | "temp_dir" => {
                temp_dir = first_string(node);
            }
            "archive-name" | "archive_name" => {
                archive_name = first_string(node);
            }
            "destination-dir" | "destination_dir" => {
                destination_dir = first_string(node);
            }
            "run-command" | "run_command" => {
                project.run_command = first_string(node);
            }
            "variables" => {
                project.variables.extend(parse_variables(node)?);
            }
            "replace-vars-patterns" | "replace_vars_patterns" => {
                let patterns = string_args(node);
                for pattern in &patterns {
                    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
                        pattern: pattern.clone(),
                        message: e.to_string(),
                    })?;
                }
                replace_vars_patterns = Some(patterns);
            }
            "docker" => {
                project.docker = parse_docker(node);
            }
            "container" => {
                project.containers.push(parse_container(node)?);
            }
            "file" => {
                project.files.push(parse_file(node)?);
            }
            "command" => {
                let (command_name, command) = parse_command(node)?;
                project.commands.insert(command_name, command);
            }
            "server" => {
                let (server_name, server) = parse_server(node)?;
                project.servers.insert(server_name, server);
            }
            other => {
                debug!(node = %other, "Skipping unknown node");
            }
        }
    }

    project.name = name.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed")
            .to_string()
    });
    project.work_dir = match work_dir {
        Some(dir) => root.join(dir),
        None => root.to_path_buf(),
    };
    project.temp_dir = match temp_dir {
        Some(dir) => root.join(dir),
        None => std::env::temp_dir().join(format!("{}-deploy-tmp", project.name)),
    };
    project.archive_name =
        archive_name.unwrap_or_else(|| format!("{}.dist.tar.gz", project.name));
    project.destination_dir = destination_dir.unwrap_or_else(|| project.name.clone());
    project.replace_vars_patterns = replace_vars_patterns.unwrap_or_else(|| {
        DEFAULT_REPLACE_VARS_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .collect()
    });

    debug!(
        project = %project.name,
        containers = project.containers.len(),
        files = project.files.len(),
        servers = project.servers.len(),
        "Config parsed"
    );
    Ok(project)
}

/// file ノードをパース
fn parse_file(node: &KdlNode) -> Result<FileSpec> {
    let path = required_name(node, "file")?;
    let env_path =
        property_string(node, &["env-path", "env_path"]).unwrap_or_else(|| path.clone());
    let replace_vars =
        property_bool(node, &["replace-vars", "replace_vars"]).unwrap_or(false);

    Ok(FileSpec {
        path,
        env_path,
        replace_vars,
    })
}

/// docker ノードをパース
fn parse_docker(node: &KdlNode) -> DockerSettings {
    let mut docker = DockerSettings::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "host" => docker.host = first_string(child),
                "buildx" => docker.buildx = flag(child),
                "platform" => docker.platform = first_string(child),
                _ => {}
            }
        }
    }

    docker
}

/// variables { NAME "value" } ブロックをパース
pub(crate) fn parse_variables(node: &KdlNode) -> Result<BTreeMap<String, String>> {
    let mut variables = BTreeMap::new();
    if let Some(vars) = node.children() {
        for var in vars.nodes() {
            let key = var.name().value().to_string();
            if !is_variable_name(&key) {
                return Err(ConfigError::InvalidVariableName(key));
            }
            let value = var
                .entries()
                .iter()
                .find(|e| e.name().is_none())
                .map(|e| match e.value().as_string() {
                    Some(s) => s.to_string(),
                    None => e.value().to_string(),
                })
                .unwrap_or_default();
            variables.insert(key, value);
        }
    }
    Ok(variables)
}

/// 最初の位置引数（文字列）
pub(crate) fn first_string(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// すべての位置引数（文字列）
pub(crate) fn string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// 真偽値ノード（引数なしの `cleanup-old` は #true 扱い）
pub(crate) fn flag(node: &KdlNode) -> bool {
    match node.entries().iter().find(|e| e.name().is_none()) {
        Some(entry) => entry.value().as_bool().unwrap_or(false),
        None => true,
    }
}

/// 名前付きプロパティ（文字列）
pub(crate) fn property_string(node: &KdlNode, keys: &[&str]) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| keys.contains(&n.value())))
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// 名前付きプロパティ（真偽値）
pub(crate) fn property_bool(node: &KdlNode, keys: &[&str]) -> Option<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_some_and(|n| keys.contains(&n.value())))
        .and_then(|e| e.value().as_bool())
}

/// 名前（最初の位置引数）が必須のノード
pub(crate) fn required_name(node: &KdlNode, kind: &str) -> Result<String> {
    first_string(node)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ConfigError::InvalidConfig(format!("{} には名前が必要です", kind)))
}
