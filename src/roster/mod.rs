/// 로스터 저장소
/// 엔진이 소유하지 않고 참조하는 시스템의 기록부. 시작 시 전체를 읽어
/// 엔진을 초기화하고, 정산 시 결과를 기록한다.
// region:    --- Imports
use crate::bidding::commands::AddItemCommand;
use crate::bidding::model::{
    BidderAccount, Item, SaleRecord, STATUS_AVAILABLE, STATUS_SOLD, STATUS_UNSOLD,
};
use crate::database::DatabaseManager;
use crate::error::StoreError;
use crate::round::{Outcome, SettlementRecord};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::{Arc, Mutex};
use tracing::info;

pub mod queries;

// endregion: --- Imports

// region:    --- Roster Store Trait

/// 로스터 저장소 추상화
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// 상품 전체 로드 (시작 시)
    async fn load_items(&self) -> Result<Vec<Item>, StoreError>;
    /// 입찰자 계정 전체 로드 (시작 시)
    async fn load_bidders(&self) -> Result<Vec<BidderAccount>, StoreError>;
    /// 판매 기록 전체 로드 (시작 시)
    async fn load_sales(&self) -> Result<Vec<SaleRecord>, StoreError>;
    /// 상품 등록 - id를 부여해 돌려준다
    async fn insert_item(&self, cmd: &AddItemCommand, default_floor: i64)
        -> Result<Item, StoreError>;
    /// 입찰자 계정 생성
    async fn create_bidder(&self, account: &BidderAccount) -> Result<(), StoreError>;
    /// 정산 결과 기록: 상품 상태 + 판매 기록 + 자본 차감을 한 트랜잭션으로
    async fn record_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError>;
    /// 상태별 상품 수 (available, sold, unsold)
    async fn roster_counts(&self) -> Result<(i64, i64, i64), StoreError>;
}

// endregion: --- Roster Store Trait

// region:    --- Postgres Roster Store

/// Postgres 구현
pub struct PostgresRosterStore {
    db: Arc<DatabaseManager>,
}

impl PostgresRosterStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RosterStore for PostgresRosterStore {
    async fn load_items(&self) -> Result<Vec<Item>, StoreError> {
        let items = sqlx::query_as::<_, Item>(queries::GET_ALL_ITEMS)
            .fetch_all(self.db.pool())
            .await?;
        Ok(items)
    }

    async fn load_bidders(&self) -> Result<Vec<BidderAccount>, StoreError> {
        let bidders = sqlx::query_as::<_, BidderAccount>(queries::GET_ALL_BIDDERS)
            .fetch_all(self.db.pool())
            .await?;
        Ok(bidders)
    }

    async fn load_sales(&self) -> Result<Vec<SaleRecord>, StoreError> {
        let sales = sqlx::query_as::<_, SaleRecord>(queries::GET_ALL_SALES)
            .fetch_all(self.db.pool())
            .await?;
        Ok(sales)
    }

    async fn insert_item(
        &self,
        cmd: &AddItemCommand,
        default_floor: i64,
    ) -> Result<Item, StoreError> {
        let item = sqlx::query_as::<_, Item>(queries::INSERT_ITEM)
            .bind(&cmd.name)
            .bind(&cmd.category)
            .bind(cmd.stats.clone().unwrap_or_else(|| serde_json::json!({})))
            .bind(&cmd.image)
            .bind(cmd.floor_price.unwrap_or(default_floor))
            .bind(Utc::now())
            .fetch_one(self.db.pool())
            .await?;
        info!("{:<12} --> 상품 저장: {} ({})", "Roster", item.id, item.name);
        Ok(item)
    }

    async fn create_bidder(&self, account: &BidderAccount) -> Result<(), StoreError> {
        sqlx::query(queries::INSERT_BIDDER)
            .bind(&account.id)
            .bind(account.initial_capital)
            .bind(account.capital)
            .bind(account.created_at)
            .execute(self.db.pool())
            .await?;
        Ok(())
    }

    async fn record_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        let rec = record.clone();
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    match rec.outcome {
                        Outcome::Sold => {
                            // 호출 경로가 amount/winner 존재를 보장한다
                            let price = rec.amount.unwrap_or_default();
                            let winner = rec.winner.clone().unwrap_or_default();
                            sqlx::query(queries::MARK_ITEM_SOLD)
                                .bind(price)
                                .bind(&winner)
                                .bind(rec.item_id)
                                .execute(&mut **tx)
                                .await?;
                            sqlx::query(queries::INSERT_SALE)
                                .bind(rec.item_id)
                                .bind(&winner)
                                .bind(price)
                                .bind(rec.settled_at)
                                .execute(&mut **tx)
                                .await?;
                            sqlx::query(queries::DEBIT_BIDDER)
                                .bind(price)
                                .bind(&winner)
                                .execute(&mut **tx)
                                .await?;
                        }
                        Outcome::Unsold => {
                            sqlx::query(queries::MARK_ITEM_UNSOLD)
                                .bind(rec.item_id)
                                .execute(&mut **tx)
                                .await?;
                        }
                    }
                    Ok::<_, StoreError>(())
                })
            })
            .await?;
        info!(
            "{:<12} --> 정산 기록 완료: 상품 {} {:?}",
            "Roster", record.item_id, record.outcome
        );
        Ok(())
    }

    async fn roster_counts(&self) -> Result<(i64, i64, i64), StoreError> {
        let row = sqlx::query(queries::COUNT_BY_STATUS)
            .fetch_one(self.db.pool())
            .await?;
        Ok((row.get("available"), row.get("sold"), row.get("unsold")))
    }
}

// endregion: --- Postgres Roster Store

// region:    --- Memory Roster Store

/// 테스트용 인메모리 구현
#[derive(Default)]
pub struct MemoryRosterStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    items: Vec<Item>,
    bidders: Vec<BidderAccount>,
    sales: Vec<SaleRecord>,
    next_item_id: i64,
    next_sale_id: i64,
}

impl MemoryRosterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테스트 시나리오용 상품 시딩
    pub fn seed_item(&self, name: &str, category: &str, floor_price: i64) -> Item {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.next_item_id += 1;
        let item = Item {
            id: inner.next_item_id,
            name: name.to_string(),
            category: category.to_string(),
            stats: serde_json::json!({}),
            image: None,
            floor_price,
            status: STATUS_AVAILABLE.to_string(),
            sold_price: None,
            winner: None,
            created_at: Utc::now(),
        };
        inner.items.push(item.clone());
        item
    }
}

#[async_trait]
impl RosterStore for MemoryRosterStore {
    async fn load_items(&self) -> Result<Vec<Item>, StoreError> {
        Ok(self.inner.lock().expect("poisoned").items.clone())
    }

    async fn load_bidders(&self) -> Result<Vec<BidderAccount>, StoreError> {
        Ok(self.inner.lock().expect("poisoned").bidders.clone())
    }

    async fn load_sales(&self) -> Result<Vec<SaleRecord>, StoreError> {
        Ok(self.inner.lock().expect("poisoned").sales.clone())
    }

    async fn insert_item(
        &self,
        cmd: &AddItemCommand,
        default_floor: i64,
    ) -> Result<Item, StoreError> {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.next_item_id += 1;
        let item = Item {
            id: inner.next_item_id,
            name: cmd.name.clone(),
            category: cmd.category.clone(),
            stats: cmd.stats.clone().unwrap_or_else(|| serde_json::json!({})),
            image: cmd.image.clone(),
            floor_price: cmd.floor_price.unwrap_or(default_floor),
            status: STATUS_AVAILABLE.to_string(),
            sold_price: None,
            winner: None,
            created_at: Utc::now(),
        };
        inner.items.push(item.clone());
        Ok(item)
    }

    async fn create_bidder(&self, account: &BidderAccount) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("poisoned");
        if !inner.bidders.iter().any(|b| b.id == account.id) {
            inner.bidders.push(account.clone());
        }
        Ok(())
    }

    async fn record_settlement(&self, record: &SettlementRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("poisoned");
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == record.item_id)
            .ok_or(StoreError::ItemNotFound(record.item_id))?;
        match record.outcome {
            Outcome::Sold => {
                item.status = STATUS_SOLD.to_string();
                item.sold_price = record.amount;
                item.winner = record.winner.clone();
                let price = record.amount.unwrap_or_default();
                let winner = record.winner.clone().unwrap_or_default();
                inner.next_sale_id += 1;
                let sale = SaleRecord {
                    id: inner.next_sale_id,
                    item_id: record.item_id,
                    bidder_id: winner.clone(),
                    price,
                    sold_at: record.settled_at,
                };
                inner.sales.push(sale);
                if let Some(bidder) = inner.bidders.iter_mut().find(|b| b.id == winner) {
                    bidder.capital -= price;
                }
            }
            Outcome::Unsold => item.status = STATUS_UNSOLD.to_string(),
        }
        Ok(())
    }

    async fn roster_counts(&self) -> Result<(i64, i64, i64), StoreError> {
        let inner = self.inner.lock().expect("poisoned");
        let count = |status: &str| inner.items.iter().filter(|i| i.status == status).count() as i64;
        Ok((
            count(STATUS_AVAILABLE),
            count(STATUS_SOLD),
            count(STATUS_UNSOLD),
        ))
    }
}

// endregion: --- Memory Roster Store
