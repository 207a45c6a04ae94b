/// 경매 조정 엔진 (순수 상태 머신)
/// 라운드 + 원장 + 로스터 캐시 + 세션 등록부를 하나의 소유 구조로 묶는다.
/// 모든 변경 연산은 호출자가 주입한 `now`를 기준으로 동작하므로 결정적이며,
/// 직렬화(단일 작성자)는 service 모듈의 액터 루프가 보장한다.
// region:    --- Imports
use crate::auction::events::{
    BidEntry, OutboundEvent, RosterView, RoundView, SaleEntry, SessionStats,
};
use crate::bidding::model::{
    BidderAccount, Item, SaleRecord, STATUS_SOLD, STATUS_UNSOLD,
};
use crate::broadcast::{Role, SessionId, SessionRegistry};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::CapitalLedger;
use crate::round::{Outcome, Round, RoundPhase, SettlementRecord};
use chrono::{DateTime, Utc};
use rand::seq::IteratorRandom;
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::info;

pub mod service;

// endregion: --- Imports

// region:    --- Auction Engine

/// 경매 세션 하나의 권위 있는 가변 상태
pub struct AuctionEngine {
    cfg: EngineConfig,
    /// 로스터 캐시 (시작 시 저장소에서 로드, 정산 시 저장소에 반영)
    items: BTreeMap<i64, Item>,
    /// 진행 중인 라운드 - None이면 Idle
    round: Option<Round>,
    ledger: CapitalLedger,
    registry: SessionRegistry,
    stats: SessionStats,
}

impl AuctionEngine {
    pub fn new(cfg: EngineConfig) -> Self {
        Self {
            cfg,
            items: BTreeMap::new(),
            round: None,
            ledger: CapitalLedger::new(),
            registry: SessionRegistry::new(),
            stats: SessionStats::default(),
        }
    }

    /// 저장소에서 읽은 로스터로 엔진 초기화
    /// 판매 기록으로 각 계정의 보유 상품을 복원한다.
    pub fn load_roster(
        &mut self,
        items: Vec<Item>,
        accounts: Vec<BidderAccount>,
        sales: Vec<SaleRecord>,
    ) {
        for item in items {
            self.items.insert(item.id, item);
        }
        for account in accounts {
            let owned = sales
                .iter()
                .filter(|s| s.bidder_id == account.id)
                .map(|s| crate::bidding::model::OwnedItem {
                    item_id: s.item_id,
                    name: self
                        .items
                        .get(&s.item_id)
                        .map(|i| i.name.clone())
                        .unwrap_or_default(),
                    price: s.price,
                })
                .collect();
            self.ledger
                .open_account(&account.id, account.initial_capital, account.capital, owned);
        }
        // 통계는 판매 기록에서 증분 재계산
        for sale in &sales {
            self.stats.record_sale(sale.price);
        }
        info!(
            "{:<12} --> 로스터 로드 완료: 상품 {}개, 판매 기록 {}건",
            "Engine",
            self.items.len(),
            sales.len()
        );
    }

    // region: --- Commands

    /// 라운드 시작 (경매사)
    /// item_id가 없으면 available 상품 중 무작위 선택.
    /// 라운드가 살아 있는 동안(Active/Settling/Cooldown)은 거부된다.
    pub fn start_round(
        &mut self,
        item_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<RoundView, EngineError> {
        if self.round.is_some() {
            return Err(EngineError::RoundInProgress);
        }

        let item_id = match item_id {
            Some(id) => id,
            None => self
                .items
                .values()
                .filter(|i| i.is_available())
                .map(|i| i.id)
                .choose(&mut rand::thread_rng())
                .ok_or_else(|| {
                    EngineError::RosterConflict("available 상태의 상품이 없습니다.".to_string())
                })?,
        };

        let item = self
            .items
            .get(&item_id)
            .ok_or_else(|| EngineError::RosterConflict(format!("상품 {}이(가) 없습니다.", item_id)))?;
        if !item.is_available() {
            return Err(EngineError::RosterConflict(format!(
                "상품 {}은(는) {} 상태입니다.",
                item_id, item.status
            )));
        }

        let round = Round::open(item_id, item.floor_price, now, self.cfg.round_timer);
        info!(
            "{:<12} --> 라운드 시작: 상품 {} ({}), 시작가 {}",
            "Engine", item_id, item.name, item.floor_price
        );
        self.registry.broadcast(&OutboundEvent::RoundStarted {
            item: item.clone(),
            floor_price: item.floor_price,
            deadline: round.deadline,
            started_at: round.started_at,
        });
        self.round = Some(round);
        Ok(self.round_view(now).expect("방금 시작한 라운드"))
    }

    /// 입찰 (Bid Validator)
    /// 검증 순서: Active 상태 → 현재 가격 초과 → 자본 확인.
    /// 수락 시 타이머를 전체 시간으로 재설정한다. 시한이 지난 입찰은
    /// 만료 틱이 아직 처리되지 않았더라도 RoundNotActive로 거절된다.
    pub fn place_bid(
        &mut self,
        bidder: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<RoundView, EngineError> {
        let current_bid = match &self.round {
            Some(r) if r.phase == RoundPhase::Active && now < r.deadline => r.current_bid,
            _ => return Err(EngineError::RoundNotActive),
        };
        if amount <= current_bid {
            return Err(EngineError::BidTooLow { current_bid });
        }
        // 입찰은 자본을 변경하지 않는다 - 확인만 한다
        self.ledger.reserve(bidder, amount)?;

        let round = self.round.as_mut().expect("위에서 확인됨");
        round.accept_bid(bidder, amount, now, self.cfg.round_timer);
        let deadline = round.deadline;
        info!(
            "{:<12} --> 입찰 수락: {} {} (시한 재설정: {})",
            "Engine", bidder, amount, deadline
        );

        self.registry.broadcast(&OutboundEvent::BidAccepted {
            bidder: bidder.to_string(),
            amount,
            deadline,
        });
        self.registry.push_bid_entry(
            BidEntry {
                bidder: bidder.to_string(),
                amount,
                at: now,
            },
            self.stats,
        );
        Ok(self.round_view(now).expect("진행 중인 라운드"))
    }

    /// 강제 낙찰 (경매사)
    /// 현재 입찰자가 없으면 낙찰자를 정할 수 없으므로 거부한다.
    pub fn force_sold(&mut self, now: DateTime<Utc>) -> Result<SettlementRecord, EngineError> {
        match &self.round {
            Some(r) if r.phase == RoundPhase::Active => {
                if r.current_bidder.is_none() {
                    return Err(EngineError::RosterConflict(
                        "현재 입찰자가 없어 낙찰 처리할 수 없습니다.".to_string(),
                    ));
                }
            }
            _ => return Err(EngineError::RoundNotActive),
        }
        self.settle_round(Outcome::Sold, now)
    }

    /// 강제 유찰 (경매사)
    /// 현재 입찰자가 있어도 명시적 유찰은 유찰로 처리한다.
    pub fn force_unsold(&mut self, now: DateTime<Utc>) -> Result<SettlementRecord, EngineError> {
        match &self.round {
            Some(r) if r.phase == RoundPhase::Active => {}
            _ => return Err(EngineError::RoundNotActive),
        }
        self.settle_round(Outcome::Unsold, now)
    }

    /// 타이머 권위 체크
    /// Active 라운드의 만료와 Cooldown 종료는 여기서만 판정한다.
    /// 만료로 정산이 일어나면 그 기록을 돌려준다 (저장소 반영용).
    pub fn check_timer(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<SettlementRecord>, EngineError> {
        let (expired, cooled) = match &self.round {
            Some(r) => (r.expired(now), r.cooldown_elapsed(now)),
            None => return Ok(None),
        };

        if expired {
            // 입찰자가 없으면 유찰 - 표시용 시작가는 입찰이 아니다
            let outcome = match self
                .round
                .as_ref()
                .and_then(|r| r.current_bidder.as_ref())
            {
                Some(_) => Outcome::Sold,
                None => Outcome::Unsold,
            };
            info!("{:<12} --> 시한 만료: {:?} 정산", "Engine", outcome);
            return self.settle_round(outcome, now).map(Some);
        }

        if cooled {
            // Cooldown → Idle: 표시 상태 초기화
            self.round = None;
            info!("{:<12} --> 쿨다운 종료: Idle 전환", "Engine");
            self.registry.broadcast(&OutboundEvent::RoundReset);
        }
        Ok(None)
    }

    /// 상품 등록 (경매사) - 저장소가 id를 부여한 완성된 상품을 받는다
    pub fn add_item(&mut self, item: Item) {
        info!(
            "{:<12} --> 상품 등록: {} ({})",
            "Engine", item.id, item.name
        );
        self.registry
            .broadcast(&OutboundEvent::ItemAdded { item: item.clone() });
        self.items.insert(item.id, item);
    }

    // endregion: --- Commands

    // region: --- Settlement

    /// Active → Settling → 결과 확정 → Cooldown
    /// 결과 브로드캐스트는 정확히 한 번이며, 원장 정산도 상품당 한 번이다.
    fn settle_round(
        &mut self,
        outcome: Outcome,
        now: DateTime<Utc>,
    ) -> Result<SettlementRecord, EngineError> {
        let mut round = match self.round.take() {
            Some(r) if r.phase == RoundPhase::Active => r,
            other => {
                self.round = other;
                return Err(EngineError::RoundNotActive);
            }
        };
        round.begin_settling();

        let item_name = self
            .items
            .get(&round.item_id)
            .map(|i| i.name.clone())
            .unwrap_or_default();

        let ledger_result = match outcome {
            Outcome::Sold => match round.current_bidder.clone() {
                Some(bidder) => self
                    .ledger
                    .settle(&bidder, round.current_bid, round.item_id, &item_name)
                    .map(|_| Some((bidder, round.current_bid))),
                None => Err(EngineError::RosterConflict(
                    "현재 입찰자가 없어 낙찰 처리할 수 없습니다.".to_string(),
                )),
            },
            Outcome::Unsold => self.ledger.mark_unsold(round.item_id).map(|_| None),
        };
        let sold = match ledger_result {
            Ok(sold) => sold,
            Err(e) => {
                // 정합성 오류 - 라운드를 Settling으로 동결하고 상위에서 처리
                self.round = Some(round);
                return Err(e);
            }
        };

        if let Some(item) = self.items.get_mut(&round.item_id) {
            match &sold {
                Some((winner, price)) => {
                    item.status = STATUS_SOLD.to_string();
                    item.sold_price = Some(*price);
                    item.winner = Some(winner.clone());
                }
                None => item.status = STATUS_UNSOLD.to_string(),
            }
        }
        if let Some((_, price)) = &sold {
            self.stats.record_sale(*price);
        }

        let record = SettlementRecord {
            item_id: round.item_id,
            item_name: item_name.clone(),
            outcome,
            amount: sold.as_ref().map(|(_, price)| *price),
            winner: sold.as_ref().map(|(winner, _)| winner.clone()),
            settled_at: now,
        };
        info!(
            "{:<12} --> 정산: 상품 {} {:?} (낙찰자: {:?}, 금액: {:?})",
            "Engine", record.item_id, outcome, record.winner, record.amount
        );

        // 결과 브로드캐스트 (정확히 한 번)
        self.registry.broadcast(&OutboundEvent::RoundSettled {
            outcome,
            item_id: record.item_id,
            item_name: record.item_name.clone(),
            amount: record.amount,
            winner: record.winner.clone(),
        });
        self.registry.push_sale_entry(
            SaleEntry {
                item_id: record.item_id,
                item_name: record.item_name.clone(),
                outcome,
                winner: record.winner.clone(),
                amount: record.amount,
                at: now,
            },
            self.stats,
        );
        // 원본의 정산 후 로스터 갱신에 해당
        self.broadcast_roster_to_auctioneers();
        if let Some(winner) = &record.winner {
            self.send_bidder_state_to(winner);
        }

        round.begin_cooldown(outcome, now, self.cfg.cooldown);
        self.round = Some(round);
        Ok(record)
    }

    // endregion: --- Settlement

    // region: --- Sessions

    /// 세션 접속
    /// 입찰자 신원이 원장에 없으면 초기 자본으로 계정을 개설하고,
    /// 신규 계정을 돌려주어 호출자가 저장소에 반영하게 한다.
    /// 접속 직후 현재 라운드 스냅샷(이벤트 이력이 아님)을 리플레이한다.
    pub fn connect(
        &mut self,
        role: Role,
        bidder_id: Option<String>,
        tx: mpsc::Sender<OutboundEvent>,
        now: DateTime<Utc>,
    ) -> Result<(SessionId, Option<BidderAccount>), EngineError> {
        if role == Role::Bidder && bidder_id.is_none() {
            return Err(EngineError::RosterConflict(
                "입찰자 세션에는 bidder_id가 필요합니다.".to_string(),
            ));
        }

        let mut created = None;
        if role == Role::Bidder {
            let id = bidder_id.as_deref().expect("위에서 확인됨");
            if !self.ledger.has_account(id) {
                self.ledger
                    .open_account(id, self.cfg.initial_capital, self.cfg.initial_capital, Vec::new());
                created = Some(BidderAccount {
                    id: id.to_string(),
                    initial_capital: self.cfg.initial_capital,
                    capital: self.cfg.initial_capital,
                    created_at: now,
                });
            }
        }

        let session_id = self.registry.connect(role, bidder_id.clone(), tx);
        info!(
            "{:<12} --> 세션 {} 접속: {:?} ({:?})",
            "Engine", session_id, role, bidder_id
        );

        // 현재 라운드 스냅샷 리플레이
        self.registry.send_to(
            session_id,
            OutboundEvent::RoundSnapshot {
                round: self.round_view(now),
            },
        );
        match role {
            Role::Auctioneer => {
                let roster = self.roster_view();
                self.registry.send_to(
                    session_id,
                    OutboundEvent::RosterSnapshot {
                        items: roster.items,
                        sold_items: roster.sold_items,
                        unsold_items: roster.unsold_items,
                        capital_by_bidder: roster.capital_by_bidder,
                    },
                );
            }
            Role::Bidder => {
                if let Some(id) = bidder_id.as_deref() {
                    self.registry
                        .send_to(session_id, self.bidder_state_event(id));
                }
            }
            Role::Observer => {
                // 롤링 로그는 빈 상태로 시작한다 (재접속 백필 없음)
                self.registry.send_to(
                    session_id,
                    OutboundEvent::ObserverDigest {
                        bid_log: Vec::new(),
                        sale_log: Vec::new(),
                        stats: self.stats,
                        connected_bidders: self.registry.connected_bidders(),
                    },
                );
            }
        }

        self.registry.broadcast(&OutboundEvent::ObserverCount {
            count: self.registry.observer_count(),
        });
        Ok((session_id, created))
    }

    /// 세션 해제 - 엔진에는 치명적이지 않다
    pub fn disconnect(&mut self, session_id: SessionId) {
        if self.registry.disconnect(session_id) {
            info!("{:<12} --> 세션 {} 해제", "Engine", session_id);
            self.registry.broadcast(&OutboundEvent::ObserverCount {
                count: self.registry.observer_count(),
            });
        }
    }

    // endregion: --- Sessions

    // region: --- Views

    /// 현재 라운드 스냅샷
    pub fn round_view(&self, now: DateTime<Utc>) -> Option<RoundView> {
        let round = self.round.as_ref()?;
        let item = self.items.get(&round.item_id)?;
        Some(RoundView {
            item: item.clone(),
            phase: round.phase,
            current_bid: round.current_bid,
            current_bidder: round.current_bidder.clone(),
            deadline: round.deadline,
            remaining_secs: round.remaining_secs(now),
            started_at: round.started_at,
            outcome: round.outcome,
        })
    }

    /// 로스터 스냅샷 (경매사 뷰)
    pub fn roster_view(&self) -> RosterView {
        let mut items = Vec::new();
        let mut sold_items = Vec::new();
        let mut unsold_items = Vec::new();
        for item in self.items.values() {
            match item.status.as_str() {
                STATUS_SOLD => sold_items.push(item.clone()),
                STATUS_UNSOLD => unsold_items.push(item.clone()),
                _ => items.push(item.clone()),
            }
        }
        RosterView {
            items,
            sold_items,
            unsold_items,
            capital_by_bidder: self.ledger.capital_by_bidder(),
        }
    }

    fn broadcast_roster_to_auctioneers(&self) {
        let roster = self.roster_view();
        self.registry.broadcast_role(
            Role::Auctioneer,
            &OutboundEvent::RosterSnapshot {
                items: roster.items,
                sold_items: roster.sold_items,
                unsold_items: roster.unsold_items,
                capital_by_bidder: roster.capital_by_bidder,
            },
        );
    }

    fn bidder_state_event(&self, bidder: &str) -> OutboundEvent {
        OutboundEvent::BidderState {
            capital: self.ledger.balance(bidder).unwrap_or_default(),
            owned_items: self.ledger.owned_items(bidder).to_vec(),
        }
    }

    fn send_bidder_state_to(&self, bidder: &str) {
        self.registry
            .send_to_bidder(bidder, &self.bidder_state_event(bidder));
    }

    pub fn config(&self) -> EngineConfig {
        self.cfg
    }

    pub fn ledger(&self) -> &CapitalLedger {
        &self.ledger
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn current_round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn capital_map(&self) -> BTreeMap<String, i64> {
        self.ledger.capital_by_bidder()
    }

    // endregion: --- Views
}

// endregion: --- Auction Engine
