use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::storage::ArtifactKind;

mod clients;
mod config;
mod degradation;
mod error;
mod extract;
mod middleware;
mod orchestrator;
mod routes;
mod state;
mod storage;

/// Seed the vector index with sample patterns when it holds fewer than this.
const SEED_THRESHOLD: u64 = 5;
const SEED_COUNT: usize = 20;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PixelPeak BCI API",
        version = "0.1.0",
        description = "Demo backend that turns decoded emotion and movement intent into speech, avatar movement and captions. Every vendor-backed response says whether it is live or a fallback."
    ),
    paths(
        routes::health::service_info,
        routes::health::liveness,
        routes::health::service_health,
        routes::scenarios::list_scenarios,
        routes::scenarios::generate_scenario,
        routes::scenarios::complete_workflow,
        routes::scenarios::emotion_to_speech,
        routes::speech::process_speech,
        routes::speech::list_voices,
        routes::patterns::similar_patterns,
        routes::patterns::index_stats,
        routes::patterns::patterns_by_emotion,
        routes::patterns::get_pattern,
        routes::patterns::delete_pattern,
        routes::avatars::create_preset,
        routes::avatars::list_avatars,
        routes::avatars::avatar_info,
        routes::avatars::delete_avatar,
        routes::avatars::avatar_animations,
        routes::emotions::emotion_profile,
    ),
    components(schemas(
        pixelpeak_core::error::ApiError,
        pixelpeak_core::provenance::Provenance,
        pixelpeak_core::provenance::ProvenanceMeta,
        pixelpeak_core::emotion::Emotion,
        pixelpeak_core::emotion::Direction,
        pixelpeak_core::scenario::Scenario,
        pixelpeak_core::scenario::ScenarioRequest,
        pixelpeak_core::scenario::AvatarMovement,
        pixelpeak_core::scenario::CaptionStyle,
        pixelpeak_core::speech::SpeechResult,
        pixelpeak_core::speech::VoiceInfo,
        pixelpeak_core::patterns::PatternQuery,
        pixelpeak_core::patterns::SimilarPattern,
        pixelpeak_core::patterns::PatternRecord,
        pixelpeak_core::patterns::IndexStats,
        pixelpeak_core::avatar::AvatarPreset,
        pixelpeak_core::avatar::AvatarAppearance,
        pixelpeak_core::avatar::AvatarRecord,
        pixelpeak_core::avatar::AvatarSummary,
        pixelpeak_core::avatar::AnimationKind,
        pixelpeak_core::avatar::AnimationClip,
        degradation::ServiceHealth,
        degradation::HealthSnapshot,
        orchestrator::ScenarioOutcome,
        orchestrator::WorkflowOutcome,
        orchestrator::ServiceReport,
        orchestrator::HealthReport,
        routes::health::ServiceInfo,
        routes::health::HealthResponse,
        routes::health::ServiceHealthResponse,
        routes::scenarios::ScenarioList,
        routes::scenarios::EmotionToSpeechRequest,
        routes::scenarios::GeneratedSpeech,
        routes::speech::ProcessSpeechRequest,
        routes::speech::VoiceList,
        routes::patterns::SimilarPatternsRequest,
        routes::patterns::PatternMatches,
        routes::patterns::PatternList,
        routes::patterns::DeleteOutcome,
        routes::avatars::CreatePresetRequest,
        routes::avatars::AvatarList,
        routes::avatars::AnimationList,
        routes::emotions::EmotionProfileResponse,
    ))
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixelpeak_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = config::ServiceConfig::from_env();
    for (vendor, configured) in config.api_key_status() {
        if !configured {
            tracing::warn!(vendor, "API key missing; capability starts in fallback mode");
        }
    }

    let orchestrator = Arc::new(orchestrator::ScenarioOrchestrator::from_config(&config));
    orchestrator
        .store()
        .ensure_layout()
        .await
        .expect("Failed to create storage directories");

    let report = orchestrator.probe_all().await;
    for (vendor, service) in &report.services {
        tracing::info!(
            vendor = %vendor,
            available = service.available,
            last_error = service.snapshot.health.last_error.as_deref().unwrap_or(""),
            "Startup probe"
        );
    }
    if report.is_healthy() {
        tracing::info!("All vendors live");
    } else {
        tracing::warn!(status = %report.status, "Starting with degraded vendors");
    }

    if report
        .services
        .get(degradation::Service::VectorStore.as_str())
        .is_some_and(|s| s.available)
    {
        let seeder = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            let stats = seeder.vector().index_stats().await;
            if !stats.is_fallback() && stats.payload().total_vector_count < SEED_THRESHOLD {
                seeder.vector().populate_sample_patterns(SEED_COUNT).await;
            }
        });
    }

    let storage_root = orchestrator.store().root().to_path_buf();
    let cors_layer = middleware::cors::build_cors_layer(&config.cors_origins);
    let port = config.port;

    let app_state = state::AppState {
        config: Arc::new(config),
        orchestrator,
    };

    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::emotions::router())
        .merge(routes::scenarios::router())
        .merge(routes::scenarios::generate_router().layer(middleware::rate_limit::vendor_layer()))
        .merge(routes::speech::synthesis_router().layer(middleware::rate_limit::vendor_layer()))
        .merge(routes::speech::voices_router().layer(middleware::rate_limit::lookup_layer()))
        .merge(routes::patterns::router().layer(middleware::rate_limit::lookup_layer()))
        .merge(routes::avatars::create_router().layer(middleware::rate_limit::vendor_layer()))
        .merge(routes::avatars::router().layer(middleware::rate_limit::lookup_layer()))
        .nest_service(
            "/audio",
            ServeDir::new(storage_root.join(ArtifactKind::Audio.dir_name())),
        )
        .nest_service(
            "/avatars",
            ServeDir::new(storage_root.join(ArtifactKind::Avatar.dir_name())),
        )
        .nest_service(
            "/scenarios",
            ServeDir::new(storage_root.join(ArtifactKind::Scenario.dir_name())),
        )
        .fallback(routes::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("PixelPeak API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
