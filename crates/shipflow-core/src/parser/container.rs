//! container ノードのパース

use super::{first_string, flag, required_name, string_args};
use crate::error::{ConfigError, Result};
use crate::model::{ContainerSpec, glob_to_regex};
use kdl::KdlNode;
use regex::Regex;

/// container ノードをパース
pub fn parse_container(node: &KdlNode) -> Result<ContainerSpec> {
    let mut container = ContainerSpec {
        name: required_name(node, "container")?,
        ..Default::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "registry" => {
                    container.registry = first_string(child).unwrap_or_default();
                }
                "dockerfile" => {
                    container.dockerfile = first_string(child).unwrap_or_default();
                }
                "build-path" | "build_path" => {
                    container.build_path = first_string(child).unwrap_or_default();
                }
                "build-args" | "build_args" => {
                    container.build_args.extend(string_args(child));
                }
                "build-contexts" | "build_contexts" => {
                    container.build_contexts.extend(string_args(child));
                }
                "archive-name" | "archive_name" => {
                    container.archive_name = first_string(child).filter(|s| !s.is_empty());
                }
                "buildx" => {
                    container.buildx = Some(flag(child));
                }
                "platform" => {
                    container.platform = first_string(child);
                }
                "docker-host" | "docker_host" => {
                    container.docker_host = first_string(child);
                }
                "deploy-separately" | "deploy_separately" => {
                    container.deploy_separately = flag(child);
                }
                "remove-old" | "remove_old" => {
                    container.remove_old = flag(child);
                }
                "ignore-existing" | "ignore_existing" => {
                    container.ignore_existing = flag(child);
                }
                "cleanup-old" | "cleanup_old" => {
                    container.retention.cleanup_old = flag(child);
                }
                "keep-versions" | "keep_versions" => {
                    let value = child
                        .entries()
                        .first()
                        .and_then(|e| e.value().as_integer())
                        .ok_or_else(|| {
                            ConfigError::InvalidConfig(format!(
                                "container '{}': keep-versions には整数が必要です",
                                container.name
                            ))
                        })?;
                    let keep = usize::try_from(value).map_err(|_| {
                        ConfigError::InvalidConfig(format!(
                            "container '{}': keep-versions は 0 以上である必要があります: {}",
                            container.name, value
                        ))
                    })?;
                    container.retention.keep_versions = keep;
                }
                "cleanup-pattern" | "cleanup_pattern" => {
                    if let Some(pattern) = first_string(child).filter(|s| !s.is_empty()) {
                        let regex = glob_to_regex(&pattern);
                        Regex::new(&regex).map_err(|e| ConfigError::InvalidPattern {
                            pattern: pattern.clone(),
                            message: e.to_string(),
                        })?;
                        container.retention.cleanup_pattern = Some(pattern);
                    }
                }
                _ => {}
            }
        }
    }

    Ok(container)
}
