use anyhow::{Context, Result};

/// Which persistence backend to run with. Both implement the same
/// `LinkStore` contract; the choice is made once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    File,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Shared admin secret, checked by exact match on every /api route
    pub admin_key: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building short links, e.g. "https://go.example.com"
    /// Must NOT have a trailing slash.
    pub base_url: String,

    /// Selected persistence backend
    pub backend: StoreBackend,

    /// SQLite connection string, e.g. "sqlite:./curtail.db" (sqlite backend)
    pub database_url: String,

    /// Path of the JSON store file (file backend)
    pub store_file: String,

    /// Optional URL to self-ping periodically so a hosting platform
    /// doesn't idle the process
    pub keepalive_url: Option<String>,

    /// Seconds between keep-alive pings
    pub keepalive_interval_secs: u64,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let admin_key = std::env::var("ADMIN_KEY")
            .context("ADMIN_KEY must be set in the environment or .env file")?;

        if admin_key.trim().is_empty() {
            anyhow::bail!("ADMIN_KEY must not be empty");
        }

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let backend = match std::env::var("STORE_BACKEND").as_deref() {
            Ok("file") => StoreBackend::File,
            Ok("sqlite") | Err(_) => StoreBackend::Sqlite,
            Ok(other) => {
                anyhow::bail!("STORE_BACKEND must be \"sqlite\" or \"file\", got {other:?}")
            }
        };

        let keepalive_interval_secs = std::env::var("KEEPALIVE_INTERVAL_SECS")
            .unwrap_or_else(|_| "840".into())
            .parse::<u64>()
            .unwrap_or(840);

        Ok(Self {
            admin_key,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            backend,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./curtail.db".into()),
            store_file: std::env::var("STORE_FILE").unwrap_or_else(|_| "./links.json".into()),
            keepalive_url: std::env::var("KEEPALIVE_URL").ok().filter(|s| !s.is_empty()),
            keepalive_interval_secs,
        })
    }

    /// Build the externally visible short link for a slug.
    pub fn short_link(&self, slug: &str) -> String {
        format!("{}/{}", self.base_url, slug)
    }
}
