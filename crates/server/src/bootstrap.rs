use std::sync::Arc;
use std::time::Duration;

use sofra_agent::{client_from_config, LlmError, NluGateway, RequestBudget};
use sofra_chat::{CloudApiGateway, NotifyError};
use sofra_core::config::AppConfig;
use sofra_db::repositories::{SqlCatalogRepository, SqlCustomerRepository, SqlOrderRepository};
use sofra_db::{connect_with_settings, migrations, DbPool};
use sofra_engine::{
    ConversationRouter, EngineConfig, InMemorySessionStore, NoopLoyaltyGateway, RouterDeps,
};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub conversation: Arc<ConversationRouter>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("whatsapp gateway setup failed: {0}")]
    Notifier(#[source] NotifyError),
    #[error("llm client setup failed: {0}")]
    Llm(#[source] LlmError),
}

/// Builds the full delivery path from a validated config: database pool,
/// migrations, SQL repositories, outbound gateway, NLU client, and the
/// conversation router on top of them.
pub async fn bootstrap(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let notifier =
        CloudApiGateway::from_config(&config.whatsapp).map_err(BootstrapError::Notifier)?;
    let llm = client_from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let nlu = NluGateway::new(
        llm,
        Duration::from_secs(config.llm.timeout_secs),
        config.llm.max_retries,
    );
    let budget = RequestBudget::new(
        config.session.nlu_budget_calls,
        Duration::from_secs(config.session.nlu_budget_window_secs),
    );

    let conversation = ConversationRouter::new(
        RouterDeps {
            store: Arc::new(InMemorySessionStore::new()),
            catalog: Arc::new(SqlCatalogRepository::new(db_pool.clone())),
            orders: Arc::new(SqlOrderRepository::new(db_pool.clone())),
            customers: Arc::new(SqlCustomerRepository::new(db_pool.clone())),
            notifier: Arc::new(notifier),
            nlu: Arc::new(nlu),
            budget: Arc::new(budget),
            loyalty: Arc::new(NoopLoyaltyGateway),
        },
        EngineConfig {
            session_ttl: Duration::from_secs(config.session.ttl_secs),
            operator_channel: config.whatsapp.operator_channel.clone(),
        },
    );
    info!(llm_provider = ?config.llm.provider, "conversation router wired");

    Ok(Application { config, db_pool, conversation: Arc::new(conversation) })
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use sofra_core::config::AppConfig;

    use crate::bootstrap::{bootstrap, BootstrapError};

    fn test_config(database_url: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.url = database_url.to_string();
        config.whatsapp.phone_number_id = "1065550001".to_string();
        config.whatsapp.access_token = SecretString::from("EAAG-test-token".to_string());
        config.whatsapp.verify_token = SecretString::from("verify-test".to_string());
        config.whatsapp.app_secret = SecretString::from("app-secret-test".to_string());
        config
    }

    #[tokio::test]
    async fn bootstrap_prepares_the_schema_and_wires_the_router() {
        let app = bootstrap(test_config("sqlite::memory:?cache=shared"))
            .await
            .expect("bootstrap should succeed with a valid config");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' \
             AND name IN ('restaurant', 'menu_item', 'customer_profile', 'customer_order')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("schema tables should be queryable after bootstrap");
        assert_eq!(table_count, 4, "bootstrap should apply the catalog and order migrations");

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_an_access_token() {
        let mut config = test_config("sqlite::memory:");
        config.whatsapp.access_token = SecretString::from(String::new());

        let error = match bootstrap(config).await {
            Ok(_) => panic!("bootstrap should fail without an access token"),
            Err(error) => error,
        };
        assert!(matches!(error, BootstrapError::Notifier(_)));
        assert!(error.to_string().contains("access_token"));
    }
}
