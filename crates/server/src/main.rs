use std::sync::Arc;

use makerboard::api;
use makerboard::config;
use makerboard::db;

use makerboard::jobs::{JobsRepo, StatsRepo};
use makerboard::offers::OffersRepo;
use makerboard::sync::{FallbackSource, LiveMarket, LiveOptions, MarketSource, PgSource, StaticSource};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "makerboard=info,makerboardd=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cfg = config::Config::from_env()?;

    tracing::info!(
        api = cfg.api_addr.as_deref().unwrap_or("disabled"),
        migrate_on_startup = cfg.migrate_on_startup,
        fallback = %cfg
            .fallback_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in demo".to_string()),
        list_limit = cfg.list_limit,
        "makerboardd starting"
    );

    let pool = db::make_pool(&cfg.database_url).await?;
    if cfg.migrate_on_startup {
        db::run_migrations(&pool).await?;
        tracing::info!("migrations applied");
    }

    let jobs_repo = JobsRepo::new(pool.clone());
    let offers_repo = OffersRepo::new(pool.clone());
    let stats_repo = StatsRepo::new(pool.clone());

    let fallback = match &cfg.fallback_path {
        Some(path) => StaticSource::load(path)?,
        None => StaticSource::demo()?,
    };
    let primary: Arc<dyn MarketSource> = Arc::new(PgSource::new(jobs_repo.clone(), offers_repo.clone()));
    let source = FallbackSource::new(primary, Arc::new(fallback));

    // ---- Live view ----
    let live = Arc::new(LiveMarket::start(
        pool.clone(),
        source.clone(),
        LiveOptions {
            limit: cfg.list_limit,
            feed_retry: cfg.feed_retry(),
            ..LiveOptions::default()
        },
    ));

    let mut notices = live.subscribe();
    let notice_log = tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(n) => tracing::info!(level = ?n.level, title = %n.title, "{}", n.description),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "notice log lagging")
                }
                Err(_) => break,
            }
        }
    });

    // ---- API task ----
    let api_state = api::ApiState {
        jobs: jobs_repo,
        offers: offers_repo,
        stats: stats_repo,
        source,
        live: Some(live.clone()),
        list_limit: cfg.list_limit,
    };
    let app = api::router(api_state);
    let api_addr = cfg.api_addr.clone();

    let api_handle = tokio::spawn(async move {
        if let Some(addr) = api_addr {
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!(%addr, "api listening");
            axum::serve(listener, app).await?;
        } else {
            std::future::pending::<()>().await;
        }
        Ok::<(), anyhow::Error>(())
    });

    tokio::select! {
        res = api_handle => res??,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    notice_log.abort();
    drop(live);
    Ok(())
}
