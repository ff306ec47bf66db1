//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, FsBlobStore, OpenAiGenerationAdapter},
    config::Config,
    error::ApiError,
    web::{rest::ApiDoc, router, state::AppState},
};
use assessment_core::extraction::DocumentExtractor;
use assessment_core::generation::GenerationClient;
use assessment_core::{AssessmentPipeline, CredentialPool, PublicationGate};
use axum::extract::DefaultBodyLimit;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let blobs = Arc::new(FsBlobStore::new(config.blob_root.clone()));
    let credentials = Arc::new(CredentialPool::new(config.generation_credentials.clone())?);
    info!(keys = credentials.len(), model = %config.generation_model, "Generation provider ready");

    let provider = Arc::new(OpenAiGenerationAdapter::new(
        &config.generation_credentials,
        config.generation_api_base.clone(),
        config.generation_model.clone(),
    ));
    let cooldown = chrono::Duration::from_std(config.credential_cooldown)
        .map_err(|e| ApiError::Internal(format!("Invalid credential cooldown: {}", e)))?;

    // --- 4. Build the Pipeline and the Shared AppState ---
    let generator = GenerationClient::new(provider, credentials, config.provider_timeout, cooldown);
    let extractor = DocumentExtractor::new(blobs, config.extraction_timeout);
    let pipeline = Arc::new(AssessmentPipeline::new(
        db_adapter.clone(),
        extractor,
        generator,
        config.pipeline.clone(),
    ));
    let gate = Arc::new(PublicationGate::new(db_adapter.clone(), db_adapter.clone()));

    let app_state = Arc::new(AppState {
        db: db_adapter,
        pipeline,
        gate,
    });

    // --- 5. Create the Web Router ---
    let origin = "http://localhost:3000"
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(api_lib::web::middleware::USER_ID_HEADER),
        ]);

    let api_router = router(app_state)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
