//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! --config <path> (optional)
//!     → mod.rs guess_config_path (explicit, working dir, user config dir)
//!     → loader.rs (read & deserialize TOML)
//!     → validation.rs (semantic checks)
//!     → Settings (validated, immutable)
//!     → owned by ProcessState, borrowed by every subsystem
//!
//! On any load failure:
//!     → warning logged
//!     → Settings::default() used instead
//! ```
//!
//! # Design Decisions
//! - A broken or missing config file never aborts startup
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

use std::path::{Path, PathBuf};

pub use loader::{load_or_default, load_settings, ConfigError};
pub use schema::{LoggingConfig, SecurityConfig, SelfTestConfig, ServerConfig, Settings};

/// File name looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "servatrice.toml";

/// Resolve which configuration file to use.
///
/// An explicit, non-empty path always wins. Otherwise the working directory
/// is checked first, then the per-user config directory. When neither
/// exists the working-directory name is returned so the caller can report it.
pub fn guess_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.as_os_str().is_empty()) {
        return path.to_path_buf();
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return local;
    }

    if let Some(user) = dirs::config_dir().map(|dir| dir.join("servatrice").join(DEFAULT_CONFIG_FILE)) {
        if user.is_file() {
            return user;
        }
    }

    local
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = guess_config_path(Some(Path::new("/etc/servatrice/custom.toml")));
        assert_eq!(path, PathBuf::from("/etc/servatrice/custom.toml"));
    }

    #[test]
    fn empty_explicit_path_is_ignored() {
        let path = guess_config_path(Some(Path::new("")));
        assert!(path.ends_with(DEFAULT_CONFIG_FILE));
    }
}
