use crate::config::{AppConfig, StoreBackend};
use crate::db;
use crate::users::{memory::InMemoryUserStore, repo::PgUserStore, repo::UserStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store = match config.store {
            StoreBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is not set"))?;
                let pool = db::connect(url, config.db_max_connections).await?;
                db::migrate(&pool).await;
                Arc::new(PgUserStore::new(pool)) as Arc<dyn UserStore>
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory user store; data is lost on restart");
                Arc::new(InMemoryUserStore::new()) as Arc<dyn UserStore>
            }
        };

        Ok(Self { config, store })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, ListingConfig};

        let config = Arc::new(AppConfig {
            store: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            jwt: JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            listing: ListingConfig::default(),
        });

        Self {
            config,
            store: Arc::new(InMemoryUserStore::new()),
        }
    }
}
