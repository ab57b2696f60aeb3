use anyhow::Result;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    /// Insert demo accounts on startup
    pub seed_database: bool,
    /// Simulated delivery latency for in-app notifications
    pub notification_delay_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-in-production".to_string());
        let seed_database = env::var("SEED_DATABASE")
            .map(|value| parse_flag(&value))
            .unwrap_or(false);
        let notification_delay_ms = env::var("NOTIFICATION_DELAY_MS")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(0);

        if environment == "production" && jwt_secret.starts_with("your-secret-key") {
            anyhow::bail!("JWT_SECRET must be set in production");
        }

        Ok(AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            seed_database,
            notification_delay_ms,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn notification_delay(&self) -> Duration {
        Duration::from_millis(self.notification_delay_ms)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_accept_common_truthy_spellings() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }

    #[test]
    fn server_address_joins_host_and_port() {
        let config = AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            environment: "development".to_string(),
            log_level: "debug".to_string(),
            jwt_secret: "secret".to_string(),
            seed_database: false,
            notification_delay_ms: 250,
        };

        assert_eq!(config.server_address(), "127.0.0.1:8080");
        assert_eq!(config.notification_delay(), Duration::from_millis(250));
        assert!(config.is_development());
        assert!(!config.is_production());
    }
}
