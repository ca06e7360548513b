use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use energy_market::domains::market::engine::EngineConfig;
use energy_market::domains::market::models::*;
use energy_market::routes::create_router;
use energy_market::shared::config::AppConfig;
use energy_market::shared::database::{Database, MemoryStore, PgStore, Store};
use energy_market::shared::middleware::auth::USER_ID_HEADER;
use energy_market::shared::services::AppState;

// OpenAPI 스키마 정의: Swagger 문서 자동 생성
#[derive(OpenApi)]
#[openapi(
    paths(
        energy_market::domains::market::handlers::order_handler::place_order,
        energy_market::domains::market::handlers::order_handler::list_orders,
        energy_market::domains::market::handlers::order_handler::list_resting_sells,
        energy_market::domains::market::handlers::order_handler::get_order,
        energy_market::domains::market::handlers::order_handler::amend_order,
        energy_market::domains::market::handlers::order_handler::cancel_order,
        energy_market::domains::market::handlers::trade_handler::list_transactions,
        energy_market::domains::market::handlers::balance_handler::get_balance
    ),
    components(schemas(
        Order,
        OrderSide,
        OrderStatus,
        PlaceOrderRequest,
        AmendOrderRequest,
        PlacedOrder,
        MatchOutcome,
        TradeLeg,
        Balance
    )),
    modifiers(
        &SecurityAddon
    ),
    tags(
        (name = "Market Orders", description = "Energy limit orders (place, amend, cancel, query)"),
        (name = "Market Transactions", description = "Settled trade legs"),
        (name = "Market Balance", description = "Money (EUR) and energy (MWh) balances")
    ),
    info(
        title = "Energy Market API Server",
        description = "Limit order matching and settlement for energy (MWh) trading",
        version = "1.0.0"
    )
)]
struct ApiDoc;

// Security scheme 정의: Swagger UI에서 X-User-Id 입력
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "UserId",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new(USER_ID_HEADER),
                    ),
                ),
            )
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 로딩 (없어도 됨)
    dotenv::dotenv().ok();
    let config = AppConfig::from_env();

    // 로그 설정
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 저장소 선택 (DATABASE_URL 없으면 인메모리)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    let store: Arc<dyn Store> = match &config.database_url {
        Some(db_url) => {
            let db = Database::new(db_url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            db.initialize().await.context("Failed to initialize database")?;
            info!("Database: PostgreSQL");
            Arc::new(PgStore::new(db))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(MemoryStore::new())
        }
    };

    // AppState 생성 + 엔진 시작 (호가창 복구)
    let engine_config = EngineConfig::from_env();
    let app_state = AppState::new(store, engine_config);
    app_state.engine.start().await.context("Failed to start matching engine")?;
    let engine = Arc::clone(&app_state.engine);

    // CORS 설정
    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .context("Invalid CORS_ORIGIN")?,
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            HeaderName::from_static("x-user-id"),
        ])
        .allow_credentials(true);

    // Router 생성
    let app = Router::new()
        .merge(create_router())
        .merge(
            SwaggerUi::new("/api")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
        )
        .layer(cors)
        .with_state(app_state);

    let listener = TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server_addr))?;

    info!("Server running on http://{}", config.server_addr);
    info!("Swagger UI available at http://{}/api", config.server_addr);

    // 서버 실행 (Ctrl+C 로 종료)
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // 대기 중인 명령 처리 후 엔진 정지
    engine.stop().await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
}
