use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::Deserialize;

mod app_env;

pub use app_env::app_env;

/// Process-level bootstrap settings: where to bind, and where the per-vhost
/// document roots and scratch space live. This is distinct from the
/// per-vhost hub config overlay (see [`crate::config_loader`]), which is
/// reloaded at runtime and addressed through the hub itself.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Directories searched, in order, for vhost document roots.
    #[serde(default)]
    pub vhost_roots: Vec<PathBuf>,
    #[serde(default)]
    pub cors: CorsSettings,
    /// Key base for HMAC-signing session tokens and SID checksums. Each
    /// signed message type derives its own key from this plus its type name
    /// (see [`crate::session::signatures::MessageVerifier`]).
    pub secret_key_base: String,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CorsSettings {
    #[serde(default)]
    allowed_origins: Vec<String>,
}

impl CorsSettings {
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }
}

pub fn settings() -> &'static Settings {
    static SETTINGS: OnceCell<Settings> = OnceCell::new();

    SETTINGS.get_or_init(|| load_settings().expect("Failed to load settings"))
}

fn load_settings() -> Result<Settings, config::ConfigError> {
    let mut config = config::Config::default();

    // TODO: Allow passing a configuration directory as a CLI arg
    let current_dir = std::env::current_dir().expect("The current directory to be available");
    let config_dir = current_dir.join("config");

    config.merge(config::File::from(config_dir.join("base")).required(false))?;
    config.merge(config::File::from(config_dir.join(app_env().as_str())).required(false))?;
    config.merge(config::Environment::with_prefix("HUBD"))?;

    config.try_into()
}
