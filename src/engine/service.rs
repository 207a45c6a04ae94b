/// 엔진 액터 루프
/// 라운드/원장에 대한 모든 변경을 단일 작성자 태스크로 직렬화한다.
/// 동시에 도착하는 입찰과 만료 틱의 경합은 큐 도착 순서로 결정된다.
/// 정산의 저장소 반영은 백그라운드 태스크로 분리되어 상태 머신을 막지 않는다.
// region:    --- Imports
use super::AuctionEngine;
use crate::auction::events::{OutboundEvent, RosterView, RoundView};
use crate::bidding::commands::AddItemCommand;
use crate::bidding::model::Item;
use crate::broadcast::{Role, SessionId};
use crate::error::EngineError;
use crate::roster::RosterStore;
use crate::round::SettlementRecord;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

// endregion: --- Imports

// region:    --- Messages

/// 엔진 명령 큐 크기
const COMMAND_BUFFER: usize = 256;

/// 액터 루프로 전달되는 메시지
pub enum EngineMessage {
    StartRound {
        item_id: Option<i64>,
        reply: oneshot::Sender<Result<RoundView, EngineError>>,
    },
    PlaceBid {
        bidder_id: String,
        amount: i64,
        reply: oneshot::Sender<Result<RoundView, EngineError>>,
    },
    ForceSold {
        reply: oneshot::Sender<Result<SettlementRecord, EngineError>>,
    },
    ForceUnsold {
        reply: oneshot::Sender<Result<SettlementRecord, EngineError>>,
    },
    AddItem {
        cmd: AddItemCommand,
        reply: oneshot::Sender<Result<Item, EngineError>>,
    },
    Connect {
        role: Role,
        bidder_id: Option<String>,
        tx: mpsc::Sender<OutboundEvent>,
        reply: oneshot::Sender<Result<SessionId, EngineError>>,
    },
    Disconnect {
        session_id: SessionId,
    },
    CheckTimer,
    GetRound {
        reply: oneshot::Sender<Option<RoundView>>,
    },
    GetRoster {
        reply: oneshot::Sender<RosterView>,
    },
}

// endregion: --- Messages

// region:    --- Engine Service

/// 엔진 액터
pub struct EngineService {
    engine: AuctionEngine,
    store: Arc<dyn RosterStore>,
    rx: mpsc::Receiver<EngineMessage>,
}

impl EngineService {
    /// 액터 스폰 - 핸들을 돌려준다
    pub fn spawn(engine: AuctionEngine, store: Arc<dyn RosterStore>) -> EngineHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let service = EngineService { engine, store, rx };
        tokio::spawn(service.run());
        EngineHandle { tx }
    }

    async fn run(mut self) {
        info!("{:<12} --> 엔진 루프 시작", "Engine");
        while let Some(msg) = self.rx.recv().await {
            self.handle(msg).await;
        }
        info!("{:<12} --> 엔진 루프 종료", "Engine");
    }

    async fn handle(&mut self, msg: EngineMessage) {
        let now = Utc::now();
        match msg {
            EngineMessage::StartRound { item_id, reply } => {
                let _ = reply.send(self.engine.start_round(item_id, now));
            }
            EngineMessage::PlaceBid {
                bidder_id,
                amount,
                reply,
            } => {
                let _ = reply.send(self.engine.place_bid(&bidder_id, amount, now));
            }
            EngineMessage::ForceSold { reply } => {
                let result = self.engine.force_sold(now);
                if let Ok(record) = &result {
                    self.persist_settlement(record.clone());
                }
                let _ = reply.send(result);
            }
            EngineMessage::ForceUnsold { reply } => {
                let result = self.engine.force_unsold(now);
                if let Ok(record) = &result {
                    self.persist_settlement(record.clone());
                }
                let _ = reply.send(result);
            }
            EngineMessage::AddItem { cmd, reply } => {
                let floor = self.engine.config().base_price;
                let result = match self.store.insert_item(&cmd, floor).await {
                    Ok(item) => {
                        self.engine.add_item(item.clone());
                        Ok(item)
                    }
                    Err(e) => Err(EngineError::Store(e)),
                };
                let _ = reply.send(result);
            }
            EngineMessage::Connect {
                role,
                bidder_id,
                tx,
                reply,
            } => {
                let result = self.engine.connect(role, bidder_id, tx, now);
                let result = match result {
                    Ok((session_id, created)) => {
                        if let Some(account) = created {
                            // 신규 입찰자 계정은 백그라운드로 저장
                            let store = Arc::clone(&self.store);
                            tokio::spawn(async move {
                                if let Err(e) = store.create_bidder(&account).await {
                                    error!(
                                        "{:<12} --> 입찰자 계정 저장 실패: {:?}",
                                        "Engine", e
                                    );
                                }
                            });
                        }
                        Ok(session_id)
                    }
                    Err(e) => Err(e),
                };
                let _ = reply.send(result);
            }
            EngineMessage::Disconnect { session_id } => {
                self.engine.disconnect(session_id);
            }
            EngineMessage::CheckTimer => match self.engine.check_timer(now) {
                Ok(Some(record)) => self.persist_settlement(record),
                Ok(None) => {}
                // DuplicateSettlement 등 - 사용자 오류가 아닌 정합성 버그
                Err(e) => error!("{:<12} --> 타이머 정산 정합성 오류: {:?}", "Engine", e),
            },
            EngineMessage::GetRound { reply } => {
                let _ = reply.send(self.engine.round_view(now));
            }
            EngineMessage::GetRoster { reply } => {
                let _ = reply.send(self.engine.roster_view());
            }
        }
    }

    /// 정산 결과를 저장소에 반영 (fire-and-forget)
    fn persist_settlement(&self, record: SettlementRecord) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.record_settlement(&record).await {
                error!(
                    "{:<12} --> 정산 저장 실패 (상품 {}): {:?}",
                    "Engine", record.item_id, e
                );
            }
        });
    }
}

// endregion: --- Engine Service

// region:    --- Engine Handle

/// 엔진 핸들 - 핸들러와 타이머가 공유한다
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    pub async fn start_round(&self, item_id: Option<i64>) -> Result<RoundView, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::StartRound { item_id, reply }).await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn place_bid(&self, bidder_id: String, amount: i64) -> Result<RoundView, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::PlaceBid {
            bidder_id,
            amount,
            reply,
        })
        .await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn force_sold(&self) -> Result<SettlementRecord, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::ForceSold { reply }).await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn force_unsold(&self) -> Result<SettlementRecord, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::ForceUnsold { reply }).await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn add_item(&self, cmd: AddItemCommand) -> Result<Item, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::AddItem { cmd, reply }).await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn connect(
        &self,
        role: Role,
        bidder_id: Option<String>,
        tx: mpsc::Sender<OutboundEvent>,
    ) -> Result<SessionId, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::Connect {
            role,
            bidder_id,
            tx,
            reply,
        })
        .await?;
        rx.await.map_err(|_| engine_gone())?
    }

    pub async fn disconnect(&self, session_id: SessionId) {
        let _ = self.tx.send(EngineMessage::Disconnect { session_id }).await;
    }

    pub async fn check_timer(&self) {
        let _ = self.tx.send(EngineMessage::CheckTimer).await;
    }

    pub async fn round(&self) -> Result<Option<RoundView>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::GetRound { reply }).await?;
        rx.await.map_err(|_| engine_gone())
    }

    pub async fn roster(&self) -> Result<RosterView, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::GetRoster { reply }).await?;
        rx.await.map_err(|_| engine_gone())
    }

    async fn send(&self, msg: EngineMessage) -> Result<(), EngineError> {
        self.tx.send(msg).await.map_err(|_| engine_gone())
    }
}

fn engine_gone() -> EngineError {
    EngineError::Internal("엔진 루프가 종료되었습니다.".to_string())
}

// endregion: --- Engine Handle
