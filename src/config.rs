use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Paging and search knobs for the directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub case_insensitive_search: bool,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
            case_insensitive_search: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown USER_STORE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt: JwtConfig,
    pub listing: ListingConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("USER_STORE") {
            Ok(v) => v.parse()?,
            Err(_) => StoreBackend::Postgres,
        };
        let database_url = std::env::var("DATABASE_URL").ok();
        if store == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL must be set when USER_STORE=postgres");
        }

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "userdir".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "userdir-clients".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };

        let defaults = ListingConfig::default();
        let listing = ListingConfig {
            default_page_size: env_parse("LIST_DEFAULT_PAGE_SIZE")
                .filter(|v: &i64| *v > 0)
                .unwrap_or(defaults.default_page_size),
            max_page_size: env_parse("LIST_MAX_PAGE_SIZE")
                .filter(|v: &i64| *v > 0)
                .unwrap_or(defaults.max_page_size),
            case_insensitive_search: env_parse("SEARCH_CASE_INSENSITIVE")
                .unwrap_or(defaults.case_insensitive_search),
        };

        Ok(Self {
            store,
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            listing,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
