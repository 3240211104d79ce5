//! Configuration document: types, persistence, validation and defaults

pub mod defaults;
pub mod loader;
pub mod types;
pub mod validation;

pub use defaults::{Defaults, DEFAULT_CONF_PATH};
pub use loader::{ConfFormat, ConfLoadError, ConfLoader};
pub use types::{Conf, VhostRecord};
pub use validation::{validate, FieldError, ServiceCommands, ValidatedConf, ValidationErrors};

use std::path::Path;

/// Load a document from `path` and validate it
pub fn load_validated(path: impl AsRef<Path>) -> crate::Result<ValidatedConf> {
    let conf = ConfLoader::load(path)?;
    Ok(validate(&conf)?)
}
