use std::sync::Arc;

use anyhow::Context;

use kardex_accounts::reaper::{Reaper, REAP_INTERVAL};
use kardex_accounts::{
    AccountFlows, IdentityStore, KeyValueStore, SessionRegistry, VerificationRegistry,
};
use kardex_api::config::ApiConfig;
use kardex_auth::{Argon2Hasher, TokenConfig, TokenSigner};
use kardex_core::SystemClock;
use kardex_infra::{HttpMailer, PostgresIdentityStore, RedisKeyValueStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    kardex_observability::init();

    let config = ApiConfig::from_env()?;

    let pool = sqlx::PgPool::connect(&config.database_url)
        .await
        .context("connecting to postgres")?;
    let store = Arc::new(PostgresIdentityStore::new(pool));
    store.ensure_schema().await.context("ensuring schema")?;
    let store: Arc<dyn IdentityStore> = store;

    let kv: Arc<dyn KeyValueStore> =
        Arc::new(RedisKeyValueStore::new(&config.redis_url).context("connecting to redis")?);
    let sessions = SessionRegistry::new(kv.clone());
    let verifications = VerificationRegistry::new(kv);

    let mailer = Arc::new(
        HttpMailer::new(
            config.mail_api_url.clone(),
            config.mail_api_token.clone(),
            config.mail_from.clone(),
        )
        .context("building mailer")?,
    );

    let clock = Arc::new(SystemClock);
    let signer = Arc::new(TokenSigner::new(TokenConfig::new(config.jwt_secret.clone())));

    let flows = Arc::new(AccountFlows::new(
        store.clone(),
        sessions,
        verifications.clone(),
        signer,
        Arc::new(Argon2Hasher),
        mailer,
        clock.clone(),
    ));

    let reaper = Arc::new(Reaper::new(store, verifications, clock));
    reaper.spawn(REAP_INTERVAL);

    let app = kardex_api::app::build_app(flows);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
