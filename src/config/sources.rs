use super::models::Config;
use config::{ConfigError, Environment, File, FileFormat, Map};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "GRABD_CONFIG";
const TOKEN_ENV_VAR: &str = "GRABD_TOKEN";
const DEFAULT_CONFIG_PATH: &str = "config/grabd.toml";
const ENV_PREFIX: &str = "GRABD";
const ENV_SEPARATOR: &str = "__";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables (highest priority)
pub fn load(path: Option<PathBuf>) -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = path.unwrap_or_else(|| {
        env::var(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    });

    let mut config = load_from_sources(config_path)?;

    load_secrets(&mut config);

    Ok(config)
}

/// The access token may come from the environment instead of the file
fn load_secrets(config: &mut Config) {
    if let Ok(token) = env::var(TOKEN_ENV_VAR) {
        config.server.token = token;
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    build(config_path, environment(None))
}

/// `GRABD__DOWNLOAD__RETRY_TIMES` -> `download.retry_times`; reads the process
/// environment unless `vars` is given
fn environment(vars: Option<Map<String, String>>) -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
        .source(vars)
}

fn build(config_path: PathBuf, environment: Environment) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).format(FileFormat::Toml));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // A value that does not parse fails the load instead of being dropped
    builder = builder.add_source(environment);

    let config = builder.build()?;
    config.try_deserialize()
}
