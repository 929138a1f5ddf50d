use config::ConfigError;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

use crate::email_client::SenderEmail;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub application: ApplicationSettings,
    pub jwt: JwtSettings,
    pub auth: AuthSettings,
    pub email_client: EmailClientSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
    /// Public URL of the dashboard; reset links point here
    pub base_url: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default)]
    pub require_ssl: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Extra connection attempts after the first one fails
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

impl DatabaseSettings {
    /// Server-level options, used to create databases
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = if self.require_ssl {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub access_token_expiry: i64,  // seconds (e.g., 900 for 15 minutes)
    pub refresh_token_expiry: i64, // seconds (e.g., 604800 for 7 days)
    /// Lifetime of the temp token handed out when a login must reset first
    pub temp_token_expiry: i64, // seconds (e.g., 600 for 10 minutes)
    pub issuer: String,
}

/// Password and account policy
#[derive(serde::Deserialize, Clone)]
pub struct AuthSettings {
    /// bcrypt work factor; 4 is the library minimum, 12 the default
    pub bcrypt_cost: u32,
    /// Lifetime of an emailed reset token, in seconds
    pub reset_token_expiry: i64,
    #[serde(default)]
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Administrator account created on startup when no account with the email
/// exists yet. The account starts in the first-login state.
#[derive(serde::Deserialize, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub name: String,
    pub password: String,
}

#[derive(serde::Deserialize, Clone)]
pub struct EmailClientSettings {
    pub base_url: String,
    pub sender_email: String,
    pub timeout_milliseconds: u64,
}

impl EmailClientSettings {
    pub fn sender(&self) -> Result<SenderEmail, String> {
        SenderEmail::parse(self.sender_email.clone())
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_milliseconds)
    }
}

/// Load settings from `configuration.yaml` (optional) and `APP__*` variables,
/// e.g. `APP__DATABASE__PASSWORD` or `APP__JWT__SECRET`.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_configuration_loads() {
        let settings = get_configuration().expect("configuration.yaml should deserialize");

        assert!(settings.jwt.temp_token_expiry < settings.jwt.access_token_expiry);
        assert!(settings.auth.bcrypt_cost >= 4);
        assert!(settings.email_client.sender().is_ok());
    }

    #[test]
    fn test_database_defaults() {
        let db: DatabaseSettings = serde_json::from_value(serde_json::json!({
            "username": "postgres",
            "password": "password",
            "port": 5432,
            "host": "localhost",
            "database_name": "siwes"
        }))
        .unwrap();

        assert!(!db.require_ssl);
        assert_eq!(db.max_connections, 10);
        assert_eq!(db.connect_retries, 5);
        assert_eq!(db.retry_base_delay_ms, 200);
    }
}
