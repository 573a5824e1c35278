use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use storefront::{
    application::{
        cart::CartService, catalog::CatalogService, error::AppError, repos::CatalogRepo,
    },
    cache::{CacheAside, CacheConfig, DetachedTasks, KvStore, MemoryKvStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, CartCookieSettings, HttpState, RateGate},
        telemetry,
        upstream::{HttpPageSource, HttpPrefetchClient},
    },
    prefetch::{ImagePrefetcher, PageImagesService, PrefetchOptions, should_prefetch},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::Prefetch(args) => run_prefetch(settings, args).await,
    }
}

fn database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database.url is not set").into())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = PostgresRepositories::connect_lazy(
        database_url(&settings)?,
        settings.database.max_connections.get(),
    )
    .map_err(InfraError::from)?;
    let repositories = Arc::new(PostgresRepositories::new(pool));
    let repo: Arc<dyn CatalogRepo> = repositories.clone();

    let tasks = DetachedTasks::new();
    let cache_config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new(&cache_config));
    let cache = CacheAside::new(cache_config, store, Arc::new(tasks.clone()));

    let page_source =
        HttpPageSource::new(&settings.prefetch.origin_url, settings.prefetch.timeout)?;
    let rate_gate = Arc::new(RateGate::from_settings(&settings.rate_limit));

    let state = HttpState {
        catalog: Arc::new(CatalogService::new(repo.clone(), cache.clone())),
        carts: Arc::new(CartService::new(repo)),
        page_images: Arc::new(PageImagesService::new(Arc::new(page_source), cache)),
        rate_gate: rate_gate.clone(),
        cart_cookie: CartCookieSettings {
            secure: settings.cart.secure_cookie,
            max_age_seconds: i64::try_from(settings.cart.max_age.as_secs()).unwrap_or(i64::MAX),
        },
        health: repositories,
    };

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));
    spawn_rate_limit_purge(
        rate_gate,
        settings.rate_limit.purge_interval,
        shutdown.clone(),
    );

    let listener = TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target: "storefront::server",
        addr = %settings.server.addr,
        cache_enabled = settings.cache.enabled,
        secure_cookie = settings.cart.secure_cookie,
        "storefront listening"
    );

    let router = http::build_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .map_err(InfraError::from)?;

    if !tasks.drain(settings.server.graceful_shutdown).await {
        warn!(
            target: "storefront::server",
            pending = tasks.pending(),
            "cache writes still pending at shutdown"
        );
    }

    info!(target: "storefront::server", "storefront shut down");
    Ok(())
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = PostgresRepositories::connect(
        database_url(&settings)?,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(InfraError::from)?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    info!(target: "storefront::migrate", "migrations applied");
    Ok(())
}

async fn run_prefetch(
    settings: config::Settings,
    args: config::PrefetchArgs,
) -> Result<(), AppError> {
    let base = args
        .base_url
        .unwrap_or_else(|| format!("http://{}", settings.server.addr));
    let client = HttpPrefetchClient::new(&base, settings.prefetch.timeout)?;
    let mut prefetcher = ImagePrefetcher::new(client, PrefetchOptions::from(&settings.prefetch));

    for path in &args.paths {
        if !should_prefetch(path) {
            warn!(target: "storefront::prefetch", path = %path, "path is never prefetched");
            continue;
        }
        let outcome = prefetcher.on_hover(path).await;
        info!(
            target: "storefront::prefetch",
            path = %path,
            fetched = outcome.fetched.len(),
            skipped_lazy = outcome.skipped_lazy,
            already_seen = outcome.already_seen,
            failed = outcome.failed,
            "page images warmed"
        );
    }

    Ok(())
}

fn spawn_rate_limit_purge(gate: Arc<RateGate>, every: Duration, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let purged = gate.purge_idle();
                    if purged > 0 {
                        debug!(target: "storefront::http::rate_limit", purged, "idle buckets purged");
                    }
                }
            }
        }
    });
}

/// Listen for SIGINT (Ctrl+C) or SIGTERM and cancel the shutdown token.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl+C only");
                ctrl_c.await.ok();
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }

    info!(target: "storefront::server", "shutdown signal received, draining connections");
    token.cancel();
}
