//! ShipFlow core
//!
//! 設定モデル、KDLパーサー、変数ストア、テンプレート展開を提供します。

pub mod discovery;
pub mod error;
pub mod model;
pub mod parser;
pub mod template;
pub mod variables;

pub use discovery::{CONFIG_FILE_NAME, find_config_file, find_config_file_from};
pub use error::{ConfigError, Result};
pub use model::*;
pub use parser::{parse_config_file, parse_config_string};
pub use template::{TemplateEngine, TemplateReport};
pub use variables::{VariableStore, is_variable_name};
