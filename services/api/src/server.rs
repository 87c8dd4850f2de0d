use crate::cli::ServeArgs;
use crate::infra::{
    seed_institutions, AppState, InMemoryAuditTrail, InMemoryCacheInvalidator,
    InMemoryCascadeQueue, InMemoryDirectoryStore, InMemoryNotificationGateway,
    InMemoryPolicyStore, InMemorySubmissionRepository, InMemoryTrustStore,
};
use crate::routes::with_moderation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use campusdir::config::AppConfig;
use campusdir::error::AppError;
use campusdir::moderation::{
    BatchScheduler, CascadeApplier, ModerationAnalytics, ModerationService, ModerationState,
};
use campusdir::telemetry;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let submissions = Arc::new(InMemorySubmissionRepository::default());
    let policy = Arc::new(InMemoryPolicyStore::default());
    let trust = Arc::new(InMemoryTrustStore::default());
    let queue = Arc::new(InMemoryCascadeQueue::default());
    let audit = Arc::new(InMemoryAuditTrail::default());
    let directory = Arc::new(InMemoryDirectoryStore::default());
    seed_institutions(&directory);

    let service = Arc::new(ModerationService::new(
        submissions.clone(),
        policy.clone(),
        trust.clone(),
        queue.clone(),
        audit.clone(),
    ));
    let analytics = Arc::new(ModerationAnalytics::new(
        submissions.clone(),
        queue.clone(),
    ));

    let applier = Arc::new(CascadeApplier::new(
        directory.clone(),
        Arc::new(InMemoryCacheInvalidator::default()),
        Arc::new(InMemoryNotificationGateway::default()),
    ));
    let scheduler = Arc::new(BatchScheduler::new(
        submissions,
        policy,
        trust,
        queue,
        audit,
        applier,
    ));

    let tick = Duration::from_secs(config.moderation.tick_minutes * 60);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first interval tick fires immediately; skip it so a fresh
        // process does not race its own seed data.
        interval.tick().await;
        loop {
            interval.tick().await;
            match scheduler.run_tick(Utc::now()) {
                Ok(summary) => info!(
                    dispatched = summary.dispatched,
                    completed = summary.completed,
                    retried = summary.retried,
                    conflicted = summary.conflicted,
                    failed = summary.failed_permanently,
                    deferred = summary.deferred,
                    "cascade tick finished"
                ),
                Err(err) => error!(error = %err, "cascade tick aborted"),
            }
        }
    });

    let state = ModerationState {
        service,
        analytics,
        directory,
    };
    let app = with_moderation_routes(state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, tick_minutes = config.moderation.tick_minutes, "campus directory moderation service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
