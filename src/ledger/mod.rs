/// 자본 원장
/// 입찰자별 자본과 보유 상품을 관리한다. 입찰은 자본을 변경하지 않으며,
/// 자본은 정산 시에만 차감된다.
///
/// 불변식: 모든 입찰자 b에 대해
/// balance(b) + sum(보유 상품 가격) == initial_capital(b)
// region:    --- Imports
use crate::bidding::model::OwnedItem;
use crate::error::EngineError;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::warn;

// endregion: --- Imports

// region:    --- Capital Ledger

/// 입찰자 계정 (원장 내부 표현)
#[derive(Debug, Clone)]
struct Account {
    initial_capital: i64,
    capital: i64,
    owned_items: Vec<OwnedItem>,
}

/// 자본 원장
#[derive(Debug, Default)]
pub struct CapitalLedger {
    accounts: HashMap<String, Account>,
    /// 정산이 끝난 상품 id 집합 - 같은 상품을 두 번 정산하면 계약 위반
    settled_items: HashSet<i64>,
}

impl CapitalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 계정 개설 (저장소 로드 또는 신규 접속 시)
    /// 이미 있는 계정이면 아무 일도 하지 않는다.
    pub fn open_account(
        &mut self,
        bidder: &str,
        initial_capital: i64,
        capital: i64,
        owned_items: Vec<OwnedItem>,
    ) {
        if self.accounts.contains_key(bidder) {
            return;
        }
        let spent: i64 = owned_items.iter().map(|o| o.price).sum();
        if initial_capital - spent != capital {
            // 저장소와 원장의 정합성 경고 - 저장소 값을 신뢰하고 계속 진행
            warn!(
                "{:<12} --> 자본 불변식 불일치: bidder={}, initial={}, spent={}, capital={}",
                "Ledger", bidder, initial_capital, spent, capital
            );
        }
        for owned in &owned_items {
            self.settled_items.insert(owned.item_id);
        }
        self.accounts.insert(
            bidder.to_string(),
            Account {
                initial_capital,
                capital,
                owned_items,
            },
        );
    }

    pub fn has_account(&self, bidder: &str) -> bool {
        self.accounts.contains_key(bidder)
    }

    /// 비변경 자본 확인: amount <= capital
    /// 입찰 수락 전 Bid Validator가 호출한다.
    pub fn reserve(&self, bidder: &str, amount: i64) -> Result<(), EngineError> {
        let account = self
            .accounts
            .get(bidder)
            .ok_or_else(|| EngineError::UnknownBidder(bidder.to_string()))?;
        if amount > account.capital {
            return Err(EngineError::InsufficientCapital {
                capital: account.capital,
                amount,
            });
        }
        Ok(())
    }

    /// 정산: 자본 차감 + 보유 상품 추가
    /// 같은 상품에 대해 두 번 호출하는 것은 내부 계약 위반이다.
    pub fn settle(
        &mut self,
        bidder: &str,
        amount: i64,
        item_id: i64,
        item_name: &str,
    ) -> Result<(), EngineError> {
        if self.settled_items.contains(&item_id) {
            return Err(EngineError::DuplicateSettlement { item_id });
        }
        let account = self
            .accounts
            .get_mut(bidder)
            .ok_or_else(|| EngineError::UnknownBidder(bidder.to_string()))?;
        if amount > account.capital {
            return Err(EngineError::InsufficientCapital {
                capital: account.capital,
                amount,
            });
        }
        account.capital -= amount;
        account.owned_items.push(OwnedItem {
            item_id,
            name: item_name.to_string(),
            price: amount,
        });
        self.settled_items.insert(item_id);
        Ok(())
    }

    /// 유찰 상품 기록 - 재정산을 막기 위해 상품 id만 표시한다.
    pub fn mark_unsold(&mut self, item_id: i64) -> Result<(), EngineError> {
        if !self.settled_items.insert(item_id) {
            return Err(EngineError::DuplicateSettlement { item_id });
        }
        Ok(())
    }

    pub fn balance(&self, bidder: &str) -> Option<i64> {
        self.accounts.get(bidder).map(|a| a.capital)
    }

    pub fn initial_capital(&self, bidder: &str) -> Option<i64> {
        self.accounts.get(bidder).map(|a| a.initial_capital)
    }

    pub fn owned_items(&self, bidder: &str) -> &[OwnedItem] {
        self.accounts
            .get(bidder)
            .map(|a| a.owned_items.as_slice())
            .unwrap_or(&[])
    }

    /// 입찰자별 자본 맵 (경매사 스냅샷용)
    pub fn capital_by_bidder(&self) -> BTreeMap<String, i64> {
        self.accounts
            .iter()
            .map(|(id, a)| (id.clone(), a.capital))
            .collect()
    }
}

// endregion: --- Capital Ledger

// region:    --- Tests


// endregion: --- Tests
