//! Process configuration, resolved once at start-up.

use clap::Parser;

/// Shopfront server configuration
#[derive(Debug, Clone, Parser)]
#[command(name = "shopfront", about = "Storefront commerce API", long_about = None)]
pub struct AppConfig {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value = "8083")]
    pub port: u16,

    /// `PostgreSQL` connection string; the in-memory store is used when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value = "10")]
    pub database_max_connections: u32,

    /// NATS server used for notification dispatch
    #[arg(long, env = "NATS_URL")]
    pub nats_url: Option<String>,

    /// Subject prefix for published domain events
    #[arg(long, env = "NOTIFY_SUBJECT_PREFIX", default_value = "shopfront")]
    pub notify_subject_prefix: String,

    /// How many order numbers to try before giving up on a collision streak
    #[arg(long, env = "ORDER_NUMBER_ATTEMPTS", default_value = "16")]
    pub order_number_attempts: u32,
}

impl AppConfig {
    /// Load configuration from `.env`, the environment and CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn commerce(&self) -> CommerceSettings {
        CommerceSettings { order_number_attempts: self.order_number_attempts.max(1) }
    }
}

/// Business settings handed to the services by their constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommerceSettings {
    pub order_number_attempts: u32,
}

impl Default for CommerceSettings {
    fn default() -> Self { Self { order_number_attempts: 16 } }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        let config = AppConfig::try_parse_from(["shopfront", "--port", "9000"]).unwrap();
        assert_eq!(config.socket_addr(), "0.0.0.0:9000");
        assert_eq!(config.commerce().order_number_attempts, 16);
    }

    #[test]
    fn zero_attempts_is_clamped() {
        let config = AppConfig::try_parse_from(["shopfront", "--order-number-attempts", "0"]).unwrap();
        assert_eq!(config.commerce().order_number_attempts, 1);
    }
}
