/// 엔진 오류 분류
/// 거절(입찰 관련)은 요청 세션에만 전달되며 라운드 상태에는 영향을 주지 않는다.
// region:    --- Imports
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

// endregion: --- Imports

// region:    --- Store Error

/// 로스터 저장소 오류
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("데이터베이스 오류: {0}")]
    Database(#[from] sqlx::Error),
    #[error("상품을 찾을 수 없습니다: {0}")]
    ItemNotFound(i64),
}

// endregion: --- Store Error

// region:    --- Engine Error

/// 엔진 오류
#[derive(Debug, Error)]
pub enum EngineError {
    /// Active 상태가 아닌 라운드에 도착한 명령
    #[error("진행 중인 라운드가 없습니다.")]
    RoundNotActive,

    /// 이미 라운드가 진행 중인 상태에서의 시작 요청
    #[error("이미 라운드가 진행 중입니다.")]
    RoundInProgress,

    /// 현재 가격보다 낮거나 같은 입찰
    #[error("입찰 금액은 현재 가격 {current_bid}보다 높아야 합니다.")]
    BidTooLow { current_bid: i64 },

    /// 자본 부족
    #[error("자본이 부족합니다. (보유: {capital}, 입찰: {amount})")]
    InsufficientCapital { capital: i64, amount: i64 },

    /// 등록되지 않은 입찰자
    #[error("등록되지 않은 입찰자입니다: {0}")]
    UnknownBidder(String),

    /// 로스터 상태 충돌 (available이 아닌 상품, 낙찰자 없는 force_sold 등)
    #[error("로스터 충돌: {0}")]
    RosterConflict(String),

    /// 동일 상품에 대한 중복 정산 - 내부 계약 위반 (직렬화가 올바르면 발생할 수 없음)
    #[error("중복 정산: 상품 {item_id}")]
    DuplicateSettlement { item_id: i64 },

    /// 저장소 오류
    #[error(transparent)]
    Store(#[from] StoreError),

    /// 내부 오류 (엔진 루프 종료 등)
    #[error("내부 오류: {0}")]
    Internal(String),
}

impl EngineError {
    /// 오류 코드 문자열 (HTTP 응답 바디의 code 필드)
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::RoundNotActive => "NOT_ACTIVE",
            EngineError::RoundInProgress => "ROUND_IN_PROGRESS",
            EngineError::BidTooLow { .. } => "LOW_BID",
            EngineError::InsufficientCapital { .. } => "INSUFFICIENT_CAPITAL",
            EngineError::UnknownBidder(_) => "UNKNOWN_BIDDER",
            EngineError::RosterConflict(_) => "ROSTER_CONFLICT",
            EngineError::DuplicateSettlement { .. } => "DUPLICATE_SETTLEMENT",
            EngineError::Store(_) => "STORE_ERROR",
            EngineError::Internal(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::RoundNotActive
            | EngineError::RoundInProgress
            | EngineError::BidTooLow { .. }
            | EngineError::InsufficientCapital { .. } => StatusCode::BAD_REQUEST,
            EngineError::UnknownBidder(_) => StatusCode::NOT_FOUND,
            EngineError::RosterConflict(_) => StatusCode::CONFLICT,
            EngineError::DuplicateSettlement { .. }
            | EngineError::Store(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (self.status_code(), Json(body)).into_response()
    }
}

// endregion: --- Engine Error
