//! command ノードのパース

use super::{property_string, required_name, string_args};
use crate::error::{ConfigError, Result};
use crate::model::{BUILTIN_STAGE_NAMES, CommandPlace, UserCommand};
use kdl::KdlNode;

/// command ノードをパース
///
/// ```kdl
/// command "restart" place="remote" {
///     run "cd $DESTINATION_DIR"
///     run "docker compose restart"
/// }
/// ```
pub fn parse_command(node: &KdlNode) -> Result<(String, UserCommand)> {
    let name = required_name(node, "command")?;
    if BUILTIN_STAGE_NAMES.contains(&name.as_str()) {
        return Err(ConfigError::InvalidConfig(format!(
            "command '{}' は組み込みステージ名と重複しています",
            name
        )));
    }

    let place = match property_string(node, &["place"]) {
        Some(place) => CommandPlace::parse(&place).ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "command '{}': place は local か remote である必要があります: {}",
                name, place
            ))
        })?,
        None => CommandPlace::default(),
    };

    let mut commands = Vec::new();
    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() == "run" {
                commands.extend(string_args(child));
            }
        }
    }

    Ok((name, UserCommand { place, commands }))
}
