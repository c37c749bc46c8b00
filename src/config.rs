use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

/// Variables shared with the postgres container through `.env.db`.
/// They win over the TOML file so both containers read one source of truth.
const POSTGRES_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("POSTGRES_HOST", "database.host"),
    ("POSTGRES_PORT", "database.port"),
    ("POSTGRES_USER", "database.user"),
    ("POSTGRES_PASSWORD", "database.password"),
    ("POSTGRES_DB", "database.name"),
];

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub run_migrations: bool,
    pub database: DatabaseConfig,
    pub pricing: PricingConfig,
    pub auth: AuthConfig,
}

#[derive(Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub pool_size: u32,
}

#[derive(Deserialize, Debug, Clone)]
pub struct PricingConfig {
    /// Multiplier applied to the cost price to get the lowest price a
    /// discounted product may sell at.
    pub loss_factor: f64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthConfig {
    pub admin_token: String,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            ),
        }
    }
}

impl Config {
    /// Loads configuration from an optional TOML file, `STORE__*` variables
    /// and the postgres variables of the current process environment.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with_env(path, std::env::vars().collect())
    }

    pub fn load_with_env<P: AsRef<Path>>(path: P, env: HashMap<String, String>) -> Result<Self> {
        let config_path = path.as_ref();

        let mut builder = config::Config::builder()
            .set_default("listen_addr", "0.0.0.0:8000")?
            .set_default("run_migrations", true)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "")?
            .set_default("database.name", "store")?
            .set_default("database.pool_size", 10)?
            .set_default("pricing.loss_factor", 1.0)?
            .set_default("auth.admin_token", "")?
            .add_source(
                config::File::from(config_path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("STORE")
                    .separator("__")
                    .source(Some(env.clone())),
            );

        for (var, key) in POSTGRES_OVERRIDES {
            builder = builder.set_override_option(*key, env.get(*var).cloned())?;
        }

        let settings = builder
            .build()
            .with_context(|| format!("Failed to build configuration from path: {:?}", config_path))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to deserialize configuration from path: {:?}", config_path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen_addr format in config: {}", self.listen_addr))
    }

    fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.auth.admin_token.trim().is_empty() {
            bail!("auth.admin_token must be set (STORE__AUTH__ADMIN_TOKEN)");
        }
        if !self.pricing.loss_factor.is_finite() || self.pricing.loss_factor < 0.0 {
            bail!("pricing.loss_factor must be a non-negative number, got {}", self.pricing.loss_factor);
        }
        if self.database.pool_size == 0 {
            bail!("database.pool_size must be at least 1");
        }
        Ok(())
    }
}
