use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub inference: InferenceConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Upload endpoint of the remote classification service.
    pub endpoint_url: String,
    /// Per-request timeout. The service offers no cancellation of its
    /// own, so expiry here is the only bound on a stuck submission.
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub db_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            inference: InferenceConfig {
                endpoint_url: "http://localhost:5000/upload".to_string(),
                timeout_seconds: 30,
            },
            store: StoreConfig {
                db_path: "/var/lib/pneumoscan/analyses.db".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.inference.endpoint_url, config.inference.endpoint_url);
        assert_eq!(parsed.inference.timeout_seconds, 30);
        assert_eq!(parsed.store.db_path, config.store.db_path);
    }
}
