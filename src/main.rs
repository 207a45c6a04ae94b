// region:    --- Imports
use auction_engine::config::Config;
use auction_engine::database::DatabaseManager;
use auction_engine::engine::service::EngineService;
use auction_engine::engine::AuctionEngine;
use auction_engine::handlers::{self, AppState};
use auction_engine::roster::{PostgresRosterStore, RosterStore};
use auction_engine::timer::TimerAuthority;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = Config::from_env();

    // DatabaseManager 생성 및 스키마 초기화
    let db_manager = match DatabaseManager::new(&config.database_url).await {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("{:<12} --> 데이터베이스 연결 실패: {:?}", "Main", e);
            return Err(e.into());
        }
    };
    if let Err(e) = db_manager.initialize_database().await {
        error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
        return Err(e.into());
    }
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 로스터 저장소에서 시작 상태 로드
    let store: Arc<dyn RosterStore> = Arc::new(PostgresRosterStore::new(Arc::clone(&db_manager)));
    let items = store.load_items().await?;
    let bidders = store.load_bidders().await?;
    let sales = store.load_sales().await?;

    // 엔진 생성 및 단일 작성자 루프 시작
    let mut engine = AuctionEngine::new(config.engine());
    engine.load_roster(items, bidders, sales);
    let engine_handle = EngineService::spawn(engine, Arc::clone(&store));
    info!("{:<12} --> 엔진 시작 성공", "Main");

    // 타이머 권위 시작
    TimerAuthority::new(engine_handle.clone()).start();

    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 라우터 설정
    let state = AppState {
        engine: engine_handle,
        store,
    };
    let routes_all = Router::new()
        .route("/round/start", post(handlers::handle_start_round))
        .route("/round/sold", post(handlers::handle_force_sold))
        .route("/round/unsold", post(handlers::handle_force_unsold))
        .route("/round", get(handlers::handle_get_round))
        .route("/bid", post(handlers::handle_place_bid))
        .route("/items", post(handlers::handle_add_item))
        .route("/roster", get(handlers::handle_get_roster))
        .route("/roster/counts", get(handlers::handle_get_roster_counts))
        .route("/ws", get(handlers::handle_session))
        .layer(cors)
        .with_state(state);

    // 리스너 생성
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}
// endregion: --- Main
