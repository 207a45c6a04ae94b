/// 명령/조회/세션 핸들러
/// 명령은 HTTP POST, 조회는 HTTP GET, 이벤트 전달은 세션당 WebSocket 하나.
// region:    --- Imports
use crate::bidding::commands::{AddItemCommand, PlaceBidCommand, StartRoundCommand};
use crate::broadcast::{Role, OUTBOUND_BUFFER};
use crate::engine::service::EngineHandle;
use crate::error::EngineError;
use crate::roster::RosterStore;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State

#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub store: Arc<dyn RosterStore>,
}

// endregion: --- App State

// region:    --- Command Handlers

/// 라운드 시작 요청 처리 (경매사)
pub async fn handle_start_round(
    State(state): State<AppState>,
    Json(cmd): Json<StartRoundCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 라운드 시작 요청: {:?}", "Command", cmd);
    match state.engine.start_round(cmd.item_id).await {
        Ok(round) => Json(json!({
            "message": "라운드가 시작되었습니다.",
            "round": round,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 입찰 요청 처리 (입찰자)
pub async fn handle_place_bid(
    State(state): State<AppState>,
    Json(cmd): Json<PlaceBidCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 요청 처리 시작: {:?}", "Command", cmd);
    match state.engine.place_bid(cmd.bidder_id, cmd.bid_amount).await {
        Ok(round) => Json(json!({
            "message": "입찰이 성공적으로 처리되었습니다.",
            "current_bid": round.current_bid,
            "deadline": round.deadline,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 강제 낙찰 요청 처리 (경매사)
pub async fn handle_force_sold(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 강제 낙찰 요청", "Command");
    match state.engine.force_sold().await {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 강제 유찰 요청 처리 (경매사)
pub async fn handle_force_unsold(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 강제 유찰 요청", "Command");
    match state.engine.force_unsold().await {
        Ok(record) => Json(record).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 상품 등록 요청 처리 (경매사)
pub async fn handle_add_item(
    State(state): State<AppState>,
    Json(cmd): Json<AddItemCommand>,
) -> impl IntoResponse {
    info!("{:<12} --> 상품 등록 요청: {}", "Command", cmd.name);
    match state.engine.add_item(cmd).await {
        Ok(item) => Json(item).into_response(),
        Err(e) => e.into_response(),
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 현재 라운드 스냅샷 조회
pub async fn handle_get_round(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 라운드 스냅샷 조회", "HandlerQuery");
    match state.engine.round().await {
        Ok(round) => Json(json!({ "round": round })).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 로스터 스냅샷 조회
pub async fn handle_get_roster(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 로스터 스냅샷 조회", "HandlerQuery");
    match state.engine.roster().await {
        Ok(roster) => Json(roster).into_response(),
        Err(e) => e.into_response(),
    }
}

/// 상태별 상품 수 조회 (권위 저장소 기준)
pub async fn handle_get_roster_counts(State(state): State<AppState>) -> impl IntoResponse {
    info!("{:<12} --> 로스터 카운트 조회", "HandlerQuery");
    match state.store.roster_counts().await {
        Ok((available, sold, unsold)) => Json(json!({
            "available": available,
            "sold": sold,
            "unsold": unsold,
        }))
        .into_response(),
        Err(e) => EngineError::from(e).into_response(),
    }
}

// endregion: --- Query Handlers

// region:    --- Session Handler

/// WebSocket 세션 파라미터
#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub role: Role,
    #[serde(default)]
    pub bidder_id: Option<String>,
}

/// 세션 접속 처리
/// 접속 즉시 엔진이 현재 라운드 스냅샷을 리플레이하고, 이후의 상태 전이는
/// 역할별 투영을 거쳐 이 소켓으로 전달된다.
pub async fn handle_session(
    ws: WebSocketUpgrade,
    Query(params): Query<SessionParams>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!("{:<12} --> 세션 업그레이드: {:?}", "Session", params);
    ws.on_upgrade(move |socket| session_loop(socket, state, params))
}

async fn session_loop(socket: WebSocket, state: AppState, params: SessionParams) {
    let (events_tx, mut events_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let session_id = match state
        .engine
        .connect(params.role, params.bidder_id.clone(), events_tx)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            let mut socket = socket;
            let _ = socket
                .send(Message::Text(
                    json!({ "error": e.to_string(), "code": e.code() }).to_string(),
                ))
                .await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(_) => continue,
                    };
                    if sink.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                // 수신 메시지는 무시한다 - 명령은 HTTP로 들어온다
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    // 접속 끊김은 엔진에 치명적이지 않다 - 세션만 해제
    state.engine.disconnect(session_id).await;
}

// endregion: --- Session Handler
