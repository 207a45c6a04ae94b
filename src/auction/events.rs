/// 서버 → 세션 이벤트 프로토콜
/// 모든 상태 전이는 이벤트 하나로 브로드캐스트되며, 역할별 투영을 거쳐 전달된다.
// region:    --- Imports
use crate::bidding::model::{Item, OwnedItem};
use crate::round::{Outcome, RoundPhase};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

// endregion: --- Imports

// region:    --- Views

/// 라운드 스냅샷 (접속/재접속 시 리플레이되는 공통 뷰)
/// remaining_secs는 deadline - now의 투영일 뿐, 표시 측은 절대 시한만 신뢰한다.
#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    pub item: Item,
    pub phase: RoundPhase,
    pub current_bid: i64,
    pub current_bidder: Option<String>,
    pub deadline: DateTime<Utc>,
    pub remaining_secs: i64,
    pub started_at: DateTime<Utc>,
    pub outcome: Option<Outcome>,
}

/// 경매사 로스터 스냅샷
#[derive(Debug, Clone, Serialize)]
pub struct RosterView {
    pub items: Vec<Item>,
    pub sold_items: Vec<Item>,
    pub unsold_items: Vec<Item>,
    pub capital_by_bidder: BTreeMap<String, i64>,
}

/// 관전자 입찰 로그 항목 (최근 10건 유지)
#[derive(Debug, Clone, Serialize)]
pub struct BidEntry {
    pub bidder: String,
    pub amount: i64,
    pub at: DateTime<Utc>,
}

/// 관전자 정산 로그 항목 (최근 5건 유지)
#[derive(Debug, Clone, Serialize)]
pub struct SaleEntry {
    pub item_id: i64,
    pub item_name: String,
    pub outcome: Outcome,
    pub winner: Option<String>,
    pub amount: Option<i64>,
    pub at: DateTime<Utc>,
}

/// 세션 전체 통계 (정산 시마다 증분 갱신, 별도 영속화하지 않음)
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SessionStats {
    pub items_sold: u64,
    pub total_value: i64,
    pub highest_sale: i64,
}

impl SessionStats {
    /// 낙찰 정산 반영
    pub fn record_sale(&mut self, amount: i64) {
        self.items_sold += 1;
        self.total_value += amount;
        self.highest_sale = self.highest_sale.max(amount);
    }
}

// endregion: --- Views

// region:    --- Outbound Events

/// 세션으로 전달되는 이벤트
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    /// 라운드 시작
    RoundStarted {
        item: Item,
        floor_price: i64,
        deadline: DateTime<Utc>,
        started_at: DateTime<Utc>,
    },
    /// 입찰 수락 (타이머는 전체 시간으로 재설정)
    BidAccepted {
        bidder: String,
        amount: i64,
        deadline: DateTime<Utc>,
    },
    /// 라운드 정산 (정확히 한 번 브로드캐스트)
    RoundSettled {
        outcome: Outcome,
        item_id: i64,
        item_name: String,
        amount: Option<i64>,
        winner: Option<String>,
    },
    /// 쿨다운 종료 - 표시 상태 초기화
    RoundReset,
    /// 상품 등록
    ItemAdded { item: Item },
    /// 접속 중인 관전자 수 변경
    ObserverCount { count: usize },
    /// 현재 라운드 스냅샷 리플레이 (이벤트 이력이 아닌 라운드 상태만 복원)
    RoundSnapshot { round: Option<RoundView> },
    /// 경매사 전용 로스터 스냅샷
    RosterSnapshot {
        items: Vec<Item>,
        sold_items: Vec<Item>,
        unsold_items: Vec<Item>,
        capital_by_bidder: BTreeMap<String, i64>,
    },
    /// 입찰자 전용: 자기 자본과 보유 상품만 (다른 입찰자의 자본은 비공개)
    BidderState {
        capital: i64,
        owned_items: Vec<OwnedItem>,
    },
    /// 관전자 전용: 롤링 로그 + 세션 통계
    ObserverDigest {
        bid_log: Vec<BidEntry>,
        sale_log: Vec<SaleEntry>,
        stats: SessionStats,
        connected_bidders: usize,
    },
}

// endregion: --- Outbound Events
