use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use k1s0_quota_engine::adapter;
use k1s0_quota_engine::adapter::repository::{
    InMemoryQuotaAssignmentRepository, InMemoryQuotaEventRepository, InMemoryQuotaOverrideRepository,
    InMemoryQuotaTierRepository, QuotaAssignmentPostgresRepository, QuotaEventPostgresRepository,
    QuotaOverridePostgresRepository, QuotaTierPostgresRepository,
};
use k1s0_quota_engine::domain::repository::{
    QuotaAssignmentRepository, QuotaEventRepository, QuotaOverrideRepository, QuotaTierRepository,
    UsageProvider,
};
use k1s0_quota_engine::infrastructure::cache::QuotaCache;
use k1s0_quota_engine::infrastructure::config::{Config, UsageProviderConfig};
use k1s0_quota_engine::infrastructure::kafka_producer::{NoopQuotaEventPublisher, QuotaEventPublisher};
use k1s0_quota_engine::infrastructure::usage_provider::{
    HttpUsageProvider, RedisUsageProvider, StaticUsageProvider,
};
use k1s0_quota_engine::infrastructure::database;
use k1s0_quota_engine::usecase;

struct Repositories {
    tiers: Arc<dyn QuotaTierRepository>,
    assignments: Arc<dyn QuotaAssignmentRepository>,
    overrides: Arc<dyn QuotaOverrideRepository>,
    events: Arc<dyn QuotaEventRepository>,
}

impl Repositories {
    fn in_memory() -> Self {
        Self {
            tiers: Arc::new(InMemoryQuotaTierRepository::new()),
            assignments: Arc::new(InMemoryQuotaAssignmentRepository::new()),
            overrides: Arc::new(InMemoryQuotaOverrideRepository::new()),
            events: Arc::new(InMemoryQuotaEventRepository::new()),
        }
    }

    fn postgres(pool: Arc<sqlx::PgPool>) -> Self {
        Self {
            tiers: Arc::new(QuotaTierPostgresRepository::new(pool.clone())),
            assignments: Arc::new(QuotaAssignmentPostgresRepository::new(pool.clone())),
            overrides: Arc::new(QuotaOverridePostgresRepository::new(pool.clone())),
            events: Arc::new(QuotaEventPostgresRepository::new(pool)),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.app.log_level.as_str()));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .init();

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting quota engine"
    );

    // --- Repository initialization: PostgreSQL → InMemory fallback ---
    let repos = if let Some(ref db_cfg) = cfg.database {
        info!("connecting to PostgreSQL");
        match database::create_pool(
            &db_cfg.url,
            db_cfg.max_connections,
            Duration::from_secs(db_cfg.connect_timeout_seconds),
        )
        .await
        {
            Ok(pool) => {
                if db_cfg.run_migrations {
                    database::run_migrations(&pool).await?;
                    info!("database migrations applied");
                }
                info!("PostgreSQL connection pool established");
                Repositories::postgres(Arc::new(pool))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to connect to PostgreSQL, falling back to InMemory"
                );
                Repositories::in_memory()
            }
        }
    } else {
        info!("no database config found, using InMemory repositories");
        Repositories::in_memory()
    };

    let usage_provider = build_usage_provider(&cfg).await?;
    let event_publisher = build_event_publisher(&cfg);

    let cache = Arc::new(QuotaCache::new(
        cfg.quota.cache.max_capacity,
        Duration::from_secs(cfg.quota.cache.ttl_secs),
    ));

    let resolve_uc = Arc::new(usecase::ResolveQuotaUseCase::new(
        repos.tiers.clone(),
        repos.assignments.clone(),
        repos.overrides.clone(),
        cache.clone(),
    ));
    let recorder = Arc::new(usecase::QuotaEventRecorder::new(
        repos.events.clone(),
        event_publisher.clone(),
        cfg.quota.warning_dedup_window_minutes,
    ));
    let check_uc = Arc::new(usecase::CheckQuotaUseCase::new(
        resolve_uc.clone(),
        usage_provider,
        recorder.clone(),
    ));

    let state = adapter::handler::AppState {
        check_uc,
        resolve_uc: resolve_uc.clone(),
        create_tier_uc: Arc::new(usecase::CreateQuotaTierUseCase::new(
            repos.tiers.clone(),
            cache.clone(),
        )),
        update_tier_uc: Arc::new(usecase::UpdateQuotaTierUseCase::new(
            repos.tiers.clone(),
            cache.clone(),
        )),
        list_tiers_uc: Arc::new(usecase::ListQuotaTiersUseCase::new(repos.tiers.clone())),
        create_assignment_uc: Arc::new(usecase::CreateQuotaAssignmentUseCase::new(
            repos.tiers.clone(),
            repos.assignments.clone(),
            cache.clone(),
        )),
        disable_assignment_uc: Arc::new(usecase::DisableQuotaAssignmentUseCase::new(
            repos.assignments.clone(),
            cache.clone(),
        )),
        create_override_uc: Arc::new(usecase::CreateQuotaOverrideUseCase::new(
            repos.overrides.clone(),
            recorder.clone(),
            cache.clone(),
        )),
        disable_override_uc: Arc::new(usecase::DisableQuotaOverrideUseCase::new(
            repos.overrides.clone(),
            cache,
        )),
        reset_uc: Arc::new(usecase::ResetUserQuotaUseCase::new(resolve_uc, recorder)),
        list_events_uc: Arc::new(usecase::ListQuotaEventsUseCase::new(repos.events)),
    };

    let app = adapter::handler::router(state);

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!("REST server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = event_publisher.close().await {
        tracing::warn!(error = %e, "failed to flush quota event publisher");
    }
    info!("quota engine stopped");
    Ok(())
}

async fn build_usage_provider(cfg: &Config) -> anyhow::Result<Arc<dyn UsageProvider>> {
    match cfg.require_usage_provider()? {
        UsageProviderConfig::Http {
            base_url,
            timeout_ms,
        } => {
            info!(base_url = %base_url, "using HTTP usage provider");
            let provider = HttpUsageProvider::new(base_url, Duration::from_millis(*timeout_ms))?;
            Ok(Arc::new(provider))
        }
        UsageProviderConfig::Redis => {
            let redis_cfg = cfg
                .redis
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("usage_provider kind 'redis' requires a redis section"))?;
            info!(url = %redis_cfg.url, "connecting to Redis for aggregated usage");
            let client = redis::Client::open(redis_cfg.url.as_str())?;
            let conn = redis::aio::ConnectionManager::new(client).await?;
            Ok(Arc::new(RedisUsageProvider::new(conn, redis_cfg.key_prefix.clone())))
        }
        UsageProviderConfig::Static => {
            tracing::warn!("using static usage provider, every user reports zero usage");
            Ok(Arc::new(StaticUsageProvider::new()))
        }
    }
}

#[cfg(feature = "kafka")]
fn build_event_publisher(cfg: &Config) -> Arc<dyn QuotaEventPublisher> {
    use k1s0_quota_engine::infrastructure::kafka_producer::KafkaQuotaProducer;

    let Some(ref kafka_cfg) = cfg.kafka else {
        info!("no Kafka config found, using NoopQuotaEventPublisher");
        return Arc::new(NoopQuotaEventPublisher);
    };
    match KafkaQuotaProducer::new(
        &kafka_cfg.brokers.join(","),
        &kafka_cfg.security_protocol,
        &kafka_cfg.topic,
    ) {
        Ok(producer) => {
            info!(topic = %kafka_cfg.topic, "Kafka producer initialized for quota events");
            Arc::new(producer)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "failed to create Kafka producer, using NoopQuotaEventPublisher"
            );
            Arc::new(NoopQuotaEventPublisher)
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn build_event_publisher(cfg: &Config) -> Arc<dyn QuotaEventPublisher> {
    if cfg.kafka.is_some() {
        tracing::warn!("kafka section present but the kafka feature is disabled");
    }
    Arc::new(NoopQuotaEventPublisher)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
