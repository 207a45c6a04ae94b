// region:    --- Imports
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Item Status
/// 상품 상태 문자열 (items.status 컬럼 값)
pub const STATUS_AVAILABLE: &str = "AVAILABLE";
pub const STATUS_SOLD: &str = "SOLD";
pub const STATUS_UNSOLD: &str = "UNSOLD";

// endregion: --- Item Status

// region:    --- Models

/// 경매 상품 모델
/// 라운드 시작 이후에는 속성이 변경되지 않는다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// 수치 스탯 필드 (jsonb)
    pub stats: serde_json::Value,
    pub image: Option<String>,
    pub floor_price: i64,
    pub status: String,
    pub sold_price: Option<i64>,
    pub winner: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.status == STATUS_AVAILABLE
    }
}

/// 입찰자 계정 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BidderAccount {
    pub id: String,
    pub initial_capital: i64,
    pub capital: i64,
    pub created_at: DateTime<Utc>,
}

/// 낙찰 기록 모델 (sales 테이블)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SaleRecord {
    pub id: i64,
    pub item_id: i64,
    pub bidder_id: String,
    pub price: i64,
    pub sold_at: DateTime<Utc>,
}

/// 입찰자가 보유한 상품 (원장 내부 표현)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedItem {
    pub item_id: i64,
    pub name: String,
    pub price: i64,
}

// endregion: --- Models
