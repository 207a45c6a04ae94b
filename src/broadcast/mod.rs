/// 세션 등록부 + 이벤트 브로드캐스터
/// 접속한 세션별 송신 채널을 보관하고, 상태 전이 이벤트를 역할별로 투영해
/// 전달한다. 전달은 세션별 fire-and-forget이다. 느리거나 끊긴 관전자가
/// 라운드 상태 머신의 진행을 막아서는 안 된다.
// region:    --- Imports
use crate::auction::events::{BidEntry, OutboundEvent, SaleEntry, SessionStats};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::debug;

// endregion: --- Imports

// region:    --- Session

pub type SessionId = u64;

/// 세션 송신 버퍼 크기 - 가득 찬 세션의 이벤트는 버린다
pub const OUTBOUND_BUFFER: usize = 64;

/// 관전자 입찰 로그 최대 보관 건수
const BID_LOG_CAP: usize = 10;
/// 관전자 정산 로그 최대 보관 건수
const SALE_LOG_CAP: usize = 5;

/// 세션 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Auctioneer,
    Bidder,
    Observer,
}

/// 접속 중인 세션
/// 영속 상태는 없다. 관전자 롤링 로그는 세션 수명에 묶이며
/// 재접속 시 빈 상태로 시작한다 (저장소 백필 없음).
struct SessionHandle {
    role: Role,
    bidder_id: Option<String>,
    tx: mpsc::Sender<OutboundEvent>,
    bid_log: VecDeque<BidEntry>,
    sale_log: VecDeque<SaleEntry>,
}

// endregion: --- Session

// region:    --- Session Registry

/// 세션 등록부
#[derive(Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, SessionHandle>,
    next_id: SessionId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 세션 등록
    pub fn connect(
        &mut self,
        role: Role,
        bidder_id: Option<String>,
        tx: mpsc::Sender<OutboundEvent>,
    ) -> SessionId {
        self.next_id += 1;
        let id = self.next_id;
        self.sessions.insert(
            id,
            SessionHandle {
                role,
                bidder_id,
                tx,
                bid_log: VecDeque::with_capacity(BID_LOG_CAP),
                sale_log: VecDeque::with_capacity(SALE_LOG_CAP),
            },
        );
        id
    }

    /// 세션 해제
    pub fn disconnect(&mut self, id: SessionId) -> bool {
        self.sessions.remove(&id).is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Observer)
            .count()
    }

    /// 접속 중인 입찰자 세션 수 (관전자 통계용)
    pub fn connected_bidders(&self) -> usize {
        self.sessions
            .values()
            .filter(|s| s.role == Role::Bidder)
            .count()
    }

    pub fn role_of(&self, id: SessionId) -> Option<Role> {
        self.sessions.get(&id).map(|s| s.role)
    }

    /// 단일 세션으로 전송
    pub fn send_to(&self, id: SessionId, event: OutboundEvent) {
        if let Some(session) = self.sessions.get(&id) {
            deliver(id, session, event);
        }
    }

    /// 전체 세션으로 브로드캐스트
    pub fn broadcast(&self, event: &OutboundEvent) {
        for (id, session) in &self.sessions {
            deliver(*id, session, event.clone());
        }
    }

    /// 특정 역할의 세션으로만 브로드캐스트
    pub fn broadcast_role(&self, role: Role, event: &OutboundEvent) {
        for (id, session) in self.sessions.iter().filter(|(_, s)| s.role == role) {
            deliver(*id, session, event.clone());
        }
    }

    /// 특정 입찰자 신원의 세션으로만 전송
    pub fn send_to_bidder(&self, bidder_id: &str, event: &OutboundEvent) {
        for (id, session) in self
            .sessions
            .iter()
            .filter(|(_, s)| s.bidder_id.as_deref() == Some(bidder_id))
        {
            deliver(*id, session, event.clone());
        }
    }

    /// 관전자 투영: 입찰 로그에 항목을 추가하고 다이제스트 전송
    pub fn push_bid_entry(&mut self, entry: BidEntry, stats: SessionStats) {
        let connected_bidders = self.connected_bidders();
        for (id, session) in self
            .sessions
            .iter_mut()
            .filter(|(_, s)| s.role == Role::Observer)
        {
            session.bid_log.push_front(entry.clone());
            session.bid_log.truncate(BID_LOG_CAP);
            let event = OutboundEvent::ObserverDigest {
                bid_log: session.bid_log.iter().cloned().collect(),
                sale_log: session.sale_log.iter().cloned().collect(),
                stats,
                connected_bidders,
            };
            deliver(*id, session, event);
        }
    }

    /// 관전자 투영: 정산 로그에 항목을 추가하고 다이제스트 전송
    pub fn push_sale_entry(&mut self, entry: SaleEntry, stats: SessionStats) {
        let connected_bidders = self.connected_bidders();
        for (id, session) in self
            .sessions
            .iter_mut()
            .filter(|(_, s)| s.role == Role::Observer)
        {
            session.sale_log.push_front(entry.clone());
            session.sale_log.truncate(SALE_LOG_CAP);
            let event = OutboundEvent::ObserverDigest {
                bid_log: session.bid_log.iter().cloned().collect(),
                sale_log: session.sale_log.iter().cloned().collect(),
                stats,
                connected_bidders,
            };
            deliver(*id, session, event);
        }
    }
}

/// 세션으로 이벤트 전달 - 실패해도 진행을 막지 않는다
fn deliver(id: SessionId, session: &SessionHandle, event: OutboundEvent) {
    if session.tx.try_send(event).is_err() {
        debug!(
            "{:<12} --> 세션 {} 전송 버퍼 가득 참 또는 종료: 이벤트 폐기",
            "Broadcast", id
        );
    }
}

// endregion: --- Session Registry

// region:    --- Tests


// endregion: --- Tests
