use crate::config::{AiProvider, DatabaseBackend, InvoiceConfig};
use crate::handlers;
use crate::services::ai::{GeminiConfig, GeminiTextGenerator, MockTextGenerator};
use crate::services::{
    InvoiceNumberAllocator, InvoiceStore, MemoryStore, MongoDb, ProfileStore, TextGenerator,
};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, patch, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: InvoiceConfig,
    pub store: Arc<dyn InvoiceStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub allocator: InvoiceNumberAllocator,
    /// `None` when AI features are disabled.
    pub text_generator: Option<Arc<dyn TextGenerator>>,
}

impl AppState {
    pub fn new(
        config: InvoiceConfig,
        store: Arc<dyn InvoiceStore>,
        profiles: Arc<dyn ProfileStore>,
        text_generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        let allocator = InvoiceNumberAllocator::new(
            store.clone(),
            config.numbering.max_attempts,
            config.numbering.retry_backoff(),
        );

        Self {
            config,
            store,
            profiles,
            allocator,
            text_generator,
        }
    }
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

type Stores = (Arc<dyn InvoiceStore>, Arc<dyn ProfileStore>);

async fn build_stores(config: &InvoiceConfig) -> Result<Stores, AppError> {
    match config.database.backend {
        DatabaseBackend::Mongo => {
            let db = MongoDb::connect(&config.database.uri, &config.database.database)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            let db = Arc::new(db);
            let store: Arc<dyn InvoiceStore> = db.clone();
            let profiles: Arc<dyn ProfileStore> = db;
            Ok((store, profiles))
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory invoice store; data is lost on restart");
            let memory = Arc::new(MemoryStore::new());
            let store: Arc<dyn InvoiceStore> = memory.clone();
            let profiles: Arc<dyn ProfileStore> = memory;
            Ok((store, profiles))
        }
    }
}

fn build_text_generator(config: &InvoiceConfig) -> Result<Option<Arc<dyn TextGenerator>>, AppError> {
    match config.ai.provider {
        AiProvider::Gemini => {
            let generator = GeminiTextGenerator::new(GeminiConfig {
                api_key: config.ai.api_key.clone().unwrap_or_default(),
                model: config.ai.model.clone(),
            })
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;
            tracing::info!(model = %config.ai.model, "Gemini text generation enabled");
            Ok(Some(Arc::new(generator)))
        }
        AiProvider::Mock => {
            tracing::info!("Mock text generation enabled");
            Ok(Some(Arc::new(MockTextGenerator::new())))
        }
        AiProvider::Disabled => {
            tracing::warn!("GEMINI_API_KEY not set, AI features are disabled");
            Ok(None)
        }
    }
}

fn cors_layer(frontend_url: &str) -> Result<CorsLayer, AppError> {
    let origin = frontend_url.parse::<HeaderValue>().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!(
            "Invalid FRONTEND_URL '{}': {}",
            frontend_url,
            e
        ))
    })?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-request-id"),
        ]))
}

pub fn router(state: AppState) -> Result<Router, AppError> {
    let cors = cors_layer(&state.config.frontend_url)?;

    let app = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/invoices",
            post(handlers::create_invoice).get(handlers::list_invoices),
        )
        .route("/invoices/user", get(handlers::list_user_invoices))
        .route(
            "/invoices/:id",
            get(handlers::get_invoice)
                .put(handlers::update_invoice)
                .delete(handlers::delete_invoice),
        )
        .route(
            "/invoices/:id/status",
            patch(handlers::update_invoice_status),
        )
        .route(
            "/ai/generate-description",
            post(handlers::generate_description),
        )
        .route("/ai/suggest-items", post(handlers::suggest_items))
        .route(
            "/users/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors);

    Ok(app)
}

impl Application {
    pub async fn build(config: InvoiceConfig) -> Result<Self, AppError> {
        let (store, profiles) = build_stores(&config).await?;
        let text_generator = build_text_generator(&config)?;
        let state = AppState::new(config.clone(), store, profiles, text_generator);

        let app = router(state.clone())?;

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn store(&self) -> Arc<dyn InvoiceStore> {
        self.state.store.clone()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
