/// 세션 → 엔진 명령 타입
/// 1. 라운드 시작 (경매사)
/// 2. 입찰 (입찰자)
/// 3. 강제 낙찰 / 강제 유찰 (경매사)
/// 4. 상품 등록 (경매사)
// region:    --- Imports
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Commands

/// 라운드 시작 명령
/// item_id가 없으면 available 상품 중 하나를 무작위로 선택한다.
#[derive(Debug, Default, Serialize, Deserialize, Clone)]
pub struct StartRoundCommand {
    pub item_id: Option<i64>,
}

/// 입찰 명령
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub bidder_id: String,
    pub bid_amount: i64,
}

/// 상품 등록 명령
/// 이미지 저장소는 외부 협력자이므로 참조 문자열만 보관한다.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AddItemCommand {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub stats: Option<serde_json::Value>,
    #[serde(default)]
    pub floor_price: Option<i64>,
    #[serde(default)]
    pub image: Option<String>,
}

// endregion: --- Commands
