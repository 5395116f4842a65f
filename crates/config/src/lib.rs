//! Configuration loading for modelprobe.
//!
//! Config files may be TOML, YAML, or JSON and support `${ENV_VAR}`
//! substitution in string values. Files are searched project-local first,
//! then under the user config directory.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{config_dir, discover_and_load, load_config},
    schema::{
        AuthConfig, DatabaseConfig, ModelprobeConfig, OAuthClientConfig, OAuthConfig, ProbeConfig,
        ServerConfig, VaultConfig,
    },
};
