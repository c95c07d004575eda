use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub registry: RegistryConfig,
    pub database: DatabaseConfig,
    pub publisher_sync: PublisherSyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    pub base_url: String,
    pub service_email: String,
    pub service_password: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublisherSyncConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry: RegistryConfig {
                base_url: "http://localhost:8080".to_string(),
                service_email: "service@example.com".to_string(),
                service_password: String::new(),
                timeout_seconds: 30,
            },
            database: DatabaseConfig {
                path: "data/outreach.db".to_string(),
            },
            publisher_sync: PublisherSyncConfig {
                enabled: true,
                interval_seconds: 900,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

pub async fn load_config(
    path: &str,
) -> std::result::Result<Config, Box<dyn std::error::Error + Send + Sync>> {
    let content = tokio::fs::read_to_string(path).await?;
    let mut config: Config = serde_yaml::from_str(&content)?;

    // Credentials come from the environment when present, so the yaml file
    // can be committed without secrets.
    if let Ok(email) = std::env::var("REGISTRY_SERVICE_EMAIL") {
        config.registry.service_email = email;
    }
    if let Ok(password) = std::env::var("REGISTRY_SERVICE_PASSWORD") {
        config.registry.service_password = password;
    }
    if let Ok(base_url) = std::env::var("REGISTRY_BASE_URL") {
        config.registry.base_url = base_url;
    }

    Ok(config)
}
