use std::{env, net::SocketAddr, path::PathBuf, time::Duration};

use clap::Parser;
use tracing::{info, warn};

use crate::error::AppError;

pub const DEFAULT_BUCKET: &str = "location-tracker";

/// Command line overrides. Anything not given here falls back to the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "fieldsurvey", about = "Field survey collection backend")]
pub struct Cli {
    /// Database connection string, e.g. `sqlite://survey.db?mode=rwc`.
    #[arg(long)]
    pub dsn: Option<String>,
    #[arg(long)]
    pub jwt_secret: Option<String>,
    /// Access token lifetime (`900s`, `15m`, `2h`, `7d`).
    #[arg(long, value_parser = parse_duration)]
    pub access_token_ttl: Option<Duration>,
    #[arg(long, value_parser = parse_duration)]
    pub refresh_token_ttl: Option<Duration>,
    #[arg(long)]
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: "your-secret-key".to_string(),
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MinioConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub use_ssl: bool,
    pub region: String,
}

#[derive(Debug, Clone)]
pub enum ObjectStoreConfig {
    Minio(MinioConfig),
    Local { root: PathBuf, public_base: String },
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub revoke_url: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: "http://localhost:8080/calling".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub cookie_secret: String,
    pub bucket: String,
    pub objects: ObjectStoreConfig,
    pub jwt: JwtConfig,
    pub oauth: OAuthConfig,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn load(cli: Cli) -> Result<Self, AppError> {
        let mut config = Self::from_env()?;
        if let Some(dsn) = cli.dsn {
            config.database_url = dsn;
        }
        if let Some(secret) = cli.jwt_secret {
            config.jwt.secret = secret;
        }
        if let Some(ttl) = cli.access_token_ttl {
            config.jwt.access_token_ttl = ttl;
        }
        if let Some(ttl) = cli.refresh_token_ttl {
            config.jwt.refresh_token_ttl = ttl;
        }
        if let Some(addr) = cli.listen {
            config.listen_addr = addr;
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self, AppError> {
        let database_url = database_url_from_env();

        let listen_addr: SocketAddr = env::var("APP_LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .map_err(|err| AppError::Config(format!("invalid APP_LISTEN_ADDR: {err}")))?;

        let cookie_secret = env::var("COOKIE_SECRET")
            .unwrap_or_else(|_| "change-me-field-survey-cookie-secret".to_string());

        let bucket = env::var("MINIO_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string());

        let objects = match env::var("MINIO_ENDPOINT") {
            Ok(endpoint) if !endpoint.trim().is_empty() => ObjectStoreConfig::Minio(MinioConfig {
                endpoint,
                access_key: env::var("MINIO_ACCESS_KEY").unwrap_or_default(),
                secret_key: env::var("MINIO_SECRET_KEY").unwrap_or_default(),
                use_ssl: env::var("MINIO_SSL").map(|v| v == "true").unwrap_or(false),
                region: env::var("MINIO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            }),
            _ => {
                let root = env::var("OBJECT_ROOT")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("objects"));
                let public_base = env::var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|_| format!("http://{listen_addr}"));
                info!("MINIO_ENDPOINT not set, storing objects under {}", root.display());
                ObjectStoreConfig::Local { root, public_base }
            }
        };

        let mut jwt = JwtConfig::default();
        if let Ok(secret) = env::var("JWT_SECRET") {
            jwt.secret = secret;
        }

        let oauth = OAuthConfig {
            client_id: env::var("GOOGLE_CLIENT_ID").unwrap_or_default(),
            client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
            redirect_url: env::var("OAUTH_REDIRECT_URL")
                .unwrap_or_else(|_| OAuthConfig::default().redirect_url),
            ..OAuthConfig::default()
        };

        let request_timeout = match env::var("REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|err| {
                AppError::Config(format!("invalid REQUEST_TIMEOUT_SECS: {err}"))
            })?),
            Err(_) => Duration::from_secs(30),
        };

        Ok(Self {
            database_url,
            listen_addr,
            cookie_secret,
            bucket,
            objects,
            jwt,
            oauth,
            request_timeout,
        })
    }
}

fn database_url_from_env() -> String {
    for key in ["DB_HOST", "DB_PORT", "DB_USER", "DB_PASSWORD"] {
        if env::var(key).is_ok() {
            warn!("{key} is set but ignored, the embedded SQLite store has no server");
        }
    }

    if let Ok(url) = env::var("DATABASE_URL") {
        return url;
    }
    match env::var("DB_NAME") {
        Ok(name) if !name.trim().is_empty() => format!("sqlite://{name}.db?mode=rwc"),
        _ => "sqlite://fieldsurvey.db?mode=rwc".to_string(),
    }
}

/// Parses `90`, `90s`, `15m`, `2h` or `7d` into a [`Duration`].
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (digits, unit) = raw.split_at(split);
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid duration `{raw}`"))?;
    let scale: u64 = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        other => return Err(format!("unknown duration unit `{other}`")),
    };
    value
        .checked_mul(scale)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration `{raw}` is too large"))
}
