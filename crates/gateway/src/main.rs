//! Quotebook API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Authentication and authorization
//! - Rate limiting
//! - Request routing to the content services
//! - Background outbox dispatchers and the sitemap refresh
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Router,
};
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use quotebook_common::{
    auth::JwtManager,
    cache::{Cache, CacheStore, MemoryCache},
    config::{AppConfig, ContentConfig},
    db::{
        models::{Quote, QuoteAuthor, QuotePiece},
        DbPool, SeaContentRepo,
    },
    metrics,
    platform::{IdGenerator, Platform, SqlPlatform},
    queue::{
        spawn_dispatcher, ActivityRecorder, LogHandler, MessageHandler, NotificationMsg, QueueReceivers,
        Queues, WebhookHandler,
    },
    search::{create_search_indexer, SearchIndexer},
    services::{ContentService, QuoteService, RelatedRepos},
    ContentEntity,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use handlers::content::{self as content, KindService};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    pub quotes: Arc<ContentService<Quote>>,
    pub authors: Arc<ContentService<QuoteAuthor>>,
    pub pieces: Arc<ContentService<QuotePiece>>,
    pub quote_service: Arc<QuoteService>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting Quotebook API Gateway v{}", quotebook_common::VERSION);
    let config = Arc::new(config);

    // Metrics endpoint
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()?;
    metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    if config.database.run_migrations {
        sqlx::migrate!("../../migrations")
            .run(db.migration_pool())
            .await
            .context("Failed to apply migrations")?;
        info!("Migrations applied");
    }

    let jwt_secret = config
        .auth
        .jwt_secret
        .as_deref()
        .context("auth.jwt_secret must be set")?;
    let jwt = Arc::new(JwtManager::new(jwt_secret, config.auth.jwt_expiration_secs));

    let cache = connect_cache(&config).await;
    let search = create_search_indexer(&config.search)?;

    let (queues, receivers) = Queues::new(config.queue.capacity);
    spawn_dispatchers(&config, &db, receivers)?;

    let sql = Arc::new(SqlPlatform::new(db.clone()));
    let platform = Platform::sql(sql.clone(), config.review.clone(), queues);
    let content_config = Arc::new(config.content.clone());

    let ids: Arc<dyn IdGenerator> = sql.clone();
    let repo_parts = RepoParts {
        db: db.clone(),
        ids,
        cache,
        search,
        config: content_config.clone(),
    };
    let quote_repo = Arc::new(repo_parts.build::<Quote>());
    let author_repo = Arc::new(repo_parts.build::<QuoteAuthor>());
    let piece_repo = Arc::new(repo_parts.build::<QuotePiece>());

    let related = RelatedRepos {
        authors: author_repo.clone(),
        pieces: piece_repo.clone(),
    };
    let quotes = Arc::new(ContentService::new(
        quote_repo,
        platform.clone(),
        content_config.clone(),
        Some(related),
    ));
    let authors = Arc::new(ContentService::new(author_repo, platform.clone(), content_config.clone(), None));
    let pieces = Arc::new(ContentService::new(piece_repo, platform, content_config, None));
    let quote_service = Arc::new(QuoteService::new(quotes.clone(), authors.clone(), pieces.clone()));

    let state = AppState {
        config: config.clone(),
        db,
        jwt,
        quotes,
        authors,
        pieces,
        quote_service,
    };

    spawn_sitemap_cron(&state);

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Collaborators shared by the per-kind repositories
struct RepoParts {
    db: DbPool,
    ids: Arc<dyn IdGenerator>,
    cache: Arc<dyn CacheStore>,
    search: Arc<dyn SearchIndexer>,
    config: Arc<ContentConfig>,
}

impl RepoParts {
    fn build<E: ContentEntity>(&self) -> SeaContentRepo<E> {
        SeaContentRepo::new(
            self.db.clone(),
            self.ids.clone(),
            self.cache.clone(),
            self.search.clone(),
            self.config.clone(),
        )
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.observability.log_level.clone()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    if config.observability.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Redis when reachable, otherwise an in-process cache
async fn connect_cache(config: &AppConfig) -> Arc<dyn CacheStore> {
    match Cache::new(&config.redis).await {
        Ok(cache) => {
            info!("Redis cache connected");
            Arc::new(cache)
        }
        Err(e) => {
            warn!(error = %e, "Redis unavailable, falling back to in-process cache");
            Arc::new(MemoryCache::new())
        }
    }
}

fn spawn_dispatchers(config: &AppConfig, db: &DbPool, receivers: QueueReceivers) -> quotebook_common::Result<()> {
    let max_elapsed = Duration::from_secs(config.queue.max_delivery_secs);

    spawn_dispatcher(
        "activity",
        receivers.activity,
        Arc::new(ActivityRecorder::new(db.write().clone())),
        max_elapsed,
    );
    spawn_dispatcher(
        "event",
        receivers.event,
        Arc::new(LogHandler::new("event")),
        max_elapsed,
    );
    spawn_dispatcher(
        "external_notification",
        receivers.external,
        Arc::new(LogHandler::new("external_notification")),
        max_elapsed,
    );

    let notifications: Arc<dyn MessageHandler<NotificationMsg>> = match &config.queue.webhook_url {
        Some(url) => Arc::new(WebhookHandler::<NotificationMsg>::new(url.clone(), config.request_timeout())?),
        None => Arc::new(LogHandler::<NotificationMsg>::new("notification")),
    };
    spawn_dispatcher("notification", receivers.notification, notifications, max_elapsed);
    Ok(())
}

/// Periodically rebuild the cached sitemap pages of every kind
fn spawn_sitemap_cron(state: &AppState) {
    let interval_secs = state.config.content.sitemap_interval_secs;
    if interval_secs == 0 {
        info!("Sitemap refresh disabled");
        return;
    }
    let state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        let short_id = state.config.site.short_id_enabled;
        loop {
            ticker.tick().await;
            let outcomes = [
                ("quote", state.quotes.sitemap_cron(short_id).await),
                ("quote_author", state.authors.sitemap_cron(short_id).await),
                ("quote_piece", state.pieces.sitemap_cron(short_id).await),
            ];
            for (kind, outcome) in outcomes {
                if let Err(e) = outcome {
                    error!(kind, error = %e, "Sitemap refresh failed");
                }
            }
        }
    });
}

/// Routes shared by every content kind, mounted under the kind's prefix
fn kind_routes<E: KindService>() -> Router<AppState> {
    Router::new()
        .route("/", get(content::page::<E>))
        .route("/search", get(content::search_by_name::<E>))
        .route("/recommend", get(content::recommend::<E>))
        .route("/personal", get(content::personal_page::<E>))
        .route("/personal/count", get(content::personal_count::<E>))
        .route("/collections", get(content::personal_collections::<E>))
        .route("/sitemap", get(content::sitemap::<E>))
        .route("/admin", get(content::admin_page::<E>))
        .route("/admin/{id}/status", put(content::admin_set_status::<E>))
        .route("/admin/users/{user_id}", delete(content::admin_remove_user_content::<E>))
        .route(
            "/{id}",
            get(content::get_item::<E>)
                .put(content::update::<E>)
                .delete(content::remove::<E>),
        )
        .route("/{id}/similar", get(content::similar::<E>))
        .route("/{id}/close", post(content::close::<E>))
        .route("/{id}/reopen", post(content::reopen::<E>))
        .route("/{id}/recover", post(content::recover::<E>))
        .route("/{id}/operation", post(content::operation::<E>))
        .route("/{id}/collection-count", post(content::collection_changed::<E>))
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        .nest(
            "/quotes",
            kind_routes::<Quote>().route("/", post(handlers::quotes::add_quote)),
        )
        .nest(
            "/quote-authors",
            kind_routes::<QuoteAuthor>().route("/", post(content::add::<QuoteAuthor>)),
        )
        .nest(
            "/quote-pieces",
            kind_routes::<QuotePiece>().route("/", post(content::add::<QuotePiece>)),
        );

    let api_routes = if state.config.rate_limit.enabled {
        let limit = state.config.rate_limit.requests_per_second;
        let limiter = middleware::rate_limit::create_rate_limiter(limit, state.config.rate_limit.burst);
        api_routes.layer(axum::middleware::from_fn(move |req, next| {
            middleware::rate_limit::rate_limit_middleware(req, next, limiter.clone(), limit)
        }))
    } else {
        api_routes
    };

    let layers = ServiceBuilder::new()
        .layer(request_id)
        .layer(propagate_id)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(state.config.request_timeout()));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(axum::middleware::from_fn(middleware::track_metrics))
        .layer(layers)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
