/// 라운드 상태 머신
/// Idle → Active → Settling → Cooldown → Idle
/// 세션 전체에서 Active/Settling 라운드는 동시에 최대 하나만 존재한다.
// region:    --- Imports
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// endregion: --- Imports

// region:    --- Phase / Outcome

/// 라운드 단계
/// Idle은 라운드 객체 부재(Option::None)로 표현되므로 여기에는 없다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundPhase {
    /// 카운트다운 진행 중, 입찰 수락
    Active,
    /// 시한 만료 또는 강제 종료, 결과 기록 중 - 입찰 불가
    Settling,
    /// 결과 브로드캐스트 완료, 다음 라운드 전 대기
    Cooldown,
}

/// 정산 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Sold,
    Unsold,
}

/// 정산 기록 - 이벤트 페이로드이자 저장소 기록 단위
#[derive(Debug, Clone, Serialize)]
pub struct SettlementRecord {
    pub item_id: i64,
    pub item_name: String,
    pub outcome: Outcome,
    pub amount: Option<i64>,
    pub winner: Option<String>,
    pub settled_at: DateTime<Utc>,
}

// endregion: --- Phase / Outcome

// region:    --- Round

/// 진행 중인 라운드
/// deadline은 절대 시각이다. 표시 측 카운트다운은 deadline - now의 투영일 뿐,
/// 만료 판정은 Timer Authority(엔진)만 내린다.
#[derive(Debug, Clone, Serialize)]
pub struct Round {
    pub item_id: i64,
    pub phase: RoundPhase,
    /// 현재 가격 (시작 시 상품 시작가 - 시작가 자체는 입찰이 아니다)
    pub current_bid: i64,
    pub current_bidder: Option<String>,
    pub deadline: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub outcome: Option<Outcome>,
}

impl Round {
    /// Idle → Active: 선택된 상품으로 라운드 시작
    pub fn open(item_id: i64, floor_price: i64, now: DateTime<Utc>, timer: Duration) -> Self {
        Self {
            item_id,
            phase: RoundPhase::Active,
            current_bid: floor_price,
            current_bidder: None,
            deadline: now + timer,
            started_at: now,
            cooldown_until: None,
            outcome: None,
        }
    }

    /// Active → Active: 입찰 수락
    /// 가격을 올리고 타이머를 전체 시간으로 재설정한다.
    pub fn accept_bid(&mut self, bidder: &str, amount: i64, now: DateTime<Utc>, timer: Duration) {
        debug_assert_eq!(self.phase, RoundPhase::Active);
        self.current_bid = amount;
        self.current_bidder = Some(bidder.to_string());
        self.deadline = now + timer;
    }

    /// Active → Settling
    pub fn begin_settling(&mut self) {
        debug_assert_eq!(self.phase, RoundPhase::Active);
        self.phase = RoundPhase::Settling;
    }

    /// Settling → Cooldown: 결과 확정 후 대기 시작
    pub fn begin_cooldown(&mut self, outcome: Outcome, now: DateTime<Utc>, dwell: Duration) {
        debug_assert_eq!(self.phase, RoundPhase::Settling);
        self.phase = RoundPhase::Cooldown;
        self.outcome = Some(outcome);
        self.cooldown_until = Some(now + dwell);
    }

    /// Active 상태에서 시한이 지났는가
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        self.phase == RoundPhase::Active && now >= self.deadline
    }

    /// 쿨다운 대기가 끝났는가
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match (self.phase, self.cooldown_until) {
            (RoundPhase::Cooldown, Some(until)) => now >= until,
            _ => false,
        }
    }

    /// 남은 시간(초) - 스냅샷 표시용
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.deadline - now).num_seconds().max(0)
    }
}

// endregion: --- Round

// region:    --- Tests


// endregion: --- Tests
