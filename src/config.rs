use std::path::{Path, PathBuf};

use anyhow::Result;
use config::{Environment, File};
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::geo::Coordinate;

pub static CONFIG: Lazy<Config> =
    Lazy::new(|| Config::load().expect("Failed to load configuration"));

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub web: WebConfig,
    pub simulation: SimulationConfig,
    pub routing: RoutingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub default_lat: f64,
    pub default_lng: f64,
    /// Upper bound in seconds on the time integrated by a single update.
    pub max_delta_time: f64,
}

impl SimulationConfig {
    pub fn origin(&self) -> Coordinate {
        Coordinate::new(self.default_lat, self.default_lng)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    pub nominatim_url: String,
    pub osrm_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Config {
    /// Load `config/{RUST_ENV}.toml`, or `/etc/drivesim/{RUST_ENV}.toml` when
    /// the local file is absent, over built-in defaults. `DRIVESIM__SECTION__KEY`
    /// environment variables override both.
    pub fn load() -> Result<Self> {
        let env = std::env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let local_dir = PathBuf::from("config");
        let config_dir = if local_dir.join(format!("{}.toml", env)).exists() {
            local_dir
        } else {
            PathBuf::from("/etc/drivesim")
        };
        Self::load_from(&config_dir, &env)
    }

    pub fn load_from(config_dir: &Path, env: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("general.log_level", "info")?
            .set_default("web.host", "0.0.0.0")?
            .set_default("web.port", 5000)?
            .set_default("simulation.default_lat", crate::vehicle::DEFAULT_LATITUDE)?
            .set_default("simulation.default_lng", crate::vehicle::DEFAULT_LONGITUDE)?
            .set_default("simulation.max_delta_time", crate::physics::MAX_DELTA_TIME)?
            .set_default("routing.nominatim_url", "https://nominatim.openstreetmap.org")?
            .set_default("routing.osrm_url", "https://router.project-osrm.org")?
            .set_default("routing.user_agent", "CarSimulator/1.0")?
            .set_default("routing.timeout_secs", 10)?
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                Environment::with_prefix("DRIVESIM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config = settings.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults_without_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let config = Config::load_from(dir.path(), "missing")?;

        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.web.port, 5000);
        assert_eq!(config.simulation.max_delta_time, 0.1);
        assert_eq!(config.simulation.origin(), Coordinate::new(12.9716, 77.5946));
        assert_eq!(config.routing.user_agent, "CarSimulator/1.0");
        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("test.toml"),
            r#"
[web]
port = 8080

[simulation]
default_lat = 10.0
default_lng = 20.0

[routing]
timeout_secs = 3
"#,
        )?;

        let config = Config::load_from(dir.path(), "test")?;
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.host, "0.0.0.0");
        assert_eq!(config.simulation.origin(), Coordinate::new(10.0, 20.0));
        assert_eq!(config.routing.timeout_secs, 3);
        assert_eq!(config.routing.osrm_url, "https://router.project-osrm.org");
        Ok(())
    }
}
