//! server ノードのパース

use super::{first_string, parse_variables, required_name};
use crate::error::{ConfigError, Result};
use crate::model::ServerSpec;
use kdl::KdlNode;

/// server ノードをパース
pub fn parse_server(node: &KdlNode) -> Result<(String, ServerSpec)> {
    let name = required_name(node, "server")?;
    let mut server = ServerSpec::default();
    let mut host = None;
    let mut version = None;
    let mut env = None;

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "host" => host = first_string(child),
                "version" => version = first_string(child),
                "env" => env = first_string(child),
                "user" => server.user = first_string(child),
                "port" => server.port = Some(parse_port(&name, child)?),
                "destination-dir" | "destination_dir" => {
                    server.destination_dir = first_string(child);
                }
                "variables" => {
                    server.variables.extend(parse_variables(child)?);
                }
                _ => {}
            }
        }
    }

    server.host = require(&name, "host", host)?;
    server.version = require(&name, "version", version)?;
    server.env = require(&name, "env", env)?;

    Ok((name, server))
}

fn require(server: &str, field: &str, value: Option<String>) -> Result<String> {
    value.filter(|v| !v.is_empty()).ok_or_else(|| {
        ConfigError::InvalidConfig(format!("server '{}' には {} が必要です", server, field))
    })
}

/// ポート番号（整数または数値文字列）
fn parse_port(server: &str, node: &KdlNode) -> Result<u16> {
    let port = node.entries().first().and_then(|e| {
        let value = e.value();
        match value.as_integer() {
            Some(i) => u16::try_from(i).ok(),
            None => value.as_string().and_then(|s| s.parse::<u16>().ok()),
        }
    });
    port.ok_or_else(|| {
        ConfigError::InvalidConfig(format!("server '{}': 無効なポート番号です", server))
    })
}
