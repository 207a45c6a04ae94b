use auction_engine::auction::events::OutboundEvent;
use auction_engine::bidding::commands::AddItemCommand;
use auction_engine::bidding::model::{BidderAccount, Item, STATUS_AVAILABLE};
use auction_engine::broadcast::{Role, OUTBOUND_BUFFER};
use auction_engine::config::EngineConfig;
use auction_engine::engine::service::EngineService;
use auction_engine::engine::AuctionEngine;
use auction_engine::error::EngineError;
use auction_engine::roster::{MemoryRosterStore, RosterStore};
use auction_engine::round::{Outcome, RoundPhase};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;

/// 테스트 기준 시각
fn t0() -> DateTime<Utc> {
    "2026-08-01T00:00:00Z".parse().unwrap()
}

/// 테스트용 상품 생성
fn test_item(id: i64, name: &str, floor_price: i64) -> Item {
    Item {
        id,
        name: name.to_string(),
        category: "배터".to_string(),
        stats: serde_json::json!({ "runs": 1200, "average": 45 }),
        image: None,
        floor_price,
        status: STATUS_AVAILABLE.to_string(),
        sold_price: None,
        winner: None,
        created_at: t0(),
    }
}

/// 테스트용 입찰자 계정 생성
fn test_account(id: &str, capital: i64) -> BidderAccount {
    BidderAccount {
        id: id.to_string(),
        initial_capital: capital,
        capital,
        created_at: t0(),
    }
}

/// 상품과 계정이 로드된 엔진 생성
fn engine_with(items: Vec<Item>, accounts: Vec<BidderAccount>) -> AuctionEngine {
    let mut engine = AuctionEngine::new(EngineConfig::default());
    engine.load_roster(items, accounts, Vec::new());
    engine
}

/// 수신 채널의 이벤트를 모두 꺼낸다
fn drain(rx: &mut mpsc::Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// region:    --- Round Lifecycle

/// 시나리오 A: 시작가 25, X가 50 (수락), Y가 50 (LOW_BID), Y가 75 (수락),
/// 시한 만료 → Sold(Y, 75). X의 자본은 그대로, Y만 75 차감.
#[test]
fn scenario_a_bid_sequence_and_expiry() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000), test_account("Y", 1000)],
    );
    let now = t0();
    let timer = engine.config().round_timer;

    let round = engine.start_round(Some(1), now).unwrap();
    assert_eq!(round.current_bid, 25);
    assert_eq!(round.current_bidder, None);

    let round = engine.place_bid("X", 50, now + Duration::seconds(1)).unwrap();
    assert_eq!(round.current_bid, 50);

    // 같은 금액은 엄격히 크지 않으므로 거절
    let err = engine
        .place_bid("Y", 50, now + Duration::seconds(2))
        .unwrap_err();
    assert!(matches!(err, EngineError::BidTooLow { current_bid: 50 }));

    let bid_at = now + Duration::seconds(3);
    let round = engine.place_bid("Y", 75, bid_at).unwrap();
    assert_eq!(round.current_bid, 75);
    assert_eq!(round.current_bidder.as_deref(), Some("Y"));
    assert_eq!(round.deadline, bid_at + timer);

    // 시한 만료 → 낙찰 정산
    let record = engine.check_timer(bid_at + timer).unwrap().unwrap();
    assert_eq!(record.outcome, Outcome::Sold);
    assert_eq!(record.winner.as_deref(), Some("Y"));
    assert_eq!(record.amount, Some(75));

    // 입찰은 자본을 변경하지 않고 정산만 차감한다
    assert_eq!(engine.ledger().balance("X"), Some(1000));
    assert_eq!(engine.ledger().balance("Y"), Some(925));
}

/// 시나리오 B: 자본 40으로 50 입찰 → INSUFFICIENT_CAPITAL, 라운드 불변
#[test]
fn scenario_b_insufficient_capital_leaves_round_unchanged() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("Z", 40)],
    );
    let now = t0();
    engine.start_round(Some(1), now).unwrap();

    let err = engine
        .place_bid("Z", 50, now + Duration::seconds(1))
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientCapital {
            capital: 40,
            amount: 50
        }
    ));

    let round = engine.current_round().unwrap();
    assert_eq!(round.current_bid, 25);
    assert_eq!(round.current_bidder, None);
    assert_eq!(round.phase, RoundPhase::Active);
}

/// 시나리오 C: 입찰자가 있어도 명시적 강제 유찰은 유찰이고,
/// 입찰자가 없는 강제 낙찰은 거부된다.
#[test]
fn scenario_c_forced_settlement_rules() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25), test_item(2, "상품B", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();

    // 입찰자가 없으면 낙찰자를 정할 수 없다
    engine.start_round(Some(1), now).unwrap();
    let err = engine.force_sold(now + Duration::seconds(1)).unwrap_err();
    assert!(matches!(err, EngineError::RosterConflict(_)));
    // 거부는 라운드를 중단시키지 않는다
    assert_eq!(engine.current_round().unwrap().phase, RoundPhase::Active);

    // 입찰자가 있어도 강제 유찰은 유찰
    engine.place_bid("X", 50, now + Duration::seconds(2)).unwrap();
    let record = engine.force_unsold(now + Duration::seconds(3)).unwrap();
    assert_eq!(record.outcome, Outcome::Unsold);
    assert_eq!(record.winner, None);
    // 유찰은 자본을 건드리지 않는다
    assert_eq!(engine.ledger().balance("X"), Some(1000));
}

/// 입찰 없는 라운드는 시작가가 표시되어 있어도 유찰로 정산된다
#[test]
fn no_bid_round_settles_unsold() {
    let mut engine = engine_with(vec![test_item(1, "상품A", 25)], Vec::new());
    let now = t0();
    engine.start_round(Some(1), now).unwrap();

    let timer = engine.config().round_timer;
    let record = engine.check_timer(now + timer).unwrap().unwrap();
    assert_eq!(record.outcome, Outcome::Unsold);
    assert_eq!(record.amount, None);
}

/// 수락된 입찰마다 금액이 엄격히 오르고 시한이 now + 전체 시간으로 연장된다
#[test]
fn accepted_bid_extends_deadline_to_full() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();
    let timer = engine.config().round_timer;
    engine.start_round(Some(1), now).unwrap();

    let bid_at = now + Duration::seconds(40);
    engine.place_bid("X", 30, bid_at).unwrap();
    let round = engine.current_round().unwrap();
    assert_eq!(round.deadline, bid_at + timer);

    // 원래 시한(now + timer)이 지나도 라운드는 계속 산다
    assert!(engine.check_timer(now + timer).unwrap().is_none());
    assert_eq!(engine.current_round().unwrap().phase, RoundPhase::Active);
}

/// 세션 전체에서 살아 있는 라운드는 최대 하나
#[test]
fn only_one_live_round() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25), test_item(2, "상품B", 25)],
        Vec::new(),
    );
    let now = t0();
    engine.start_round(Some(1), now).unwrap();
    assert!(matches!(
        engine.start_round(Some(2), now),
        Err(EngineError::RoundInProgress)
    ));

    // Cooldown 동안에도 다음 라운드는 시작할 수 없다
    engine.force_unsold(now + Duration::seconds(1)).unwrap();
    assert!(matches!(
        engine.start_round(Some(2), now + Duration::seconds(2)),
        Err(EngineError::RoundInProgress)
    ));

    // 쿨다운 대기 후 Idle → 다음 라운드 시작 가능
    let after_dwell = now + Duration::seconds(1) + engine.config().cooldown;
    engine.check_timer(after_dwell).unwrap();
    assert!(engine.current_round().is_none());
    engine.start_round(Some(2), after_dwell).unwrap();
}

/// 만료 시각 이후에 도착한 입찰은 틱이 아직 처리되지 않았어도 거절된다
#[test]
fn late_bid_loses_expiry_race() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();
    let timer = engine.config().round_timer;
    engine.start_round(Some(1), now).unwrap();

    // 시한 정각의 입찰은 "엄격히 이전"이 아니므로 패배
    let err = engine.place_bid("X", 50, now + timer).unwrap_err();
    assert!(matches!(err, EngineError::RoundNotActive));

    // 시한 직전의 입찰은 승리하고 시한을 연장한다
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    engine.start_round(Some(1), now).unwrap();
    let just_before = now + timer - Duration::milliseconds(1);
    engine.place_bid("X", 50, just_before).unwrap();
    assert!(engine.check_timer(now + timer).unwrap().is_none());
}

/// 정산 이후의 강제 명령은 거절된다 (정산은 상품당 정확히 한 번)
#[test]
fn settlement_happens_exactly_once() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();
    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 50, now + Duration::seconds(1)).unwrap();

    engine.force_sold(now + Duration::seconds(2)).unwrap();
    assert!(matches!(
        engine.force_sold(now + Duration::seconds(3)),
        Err(EngineError::RoundNotActive)
    ));
    // 이중 차감 없음
    assert_eq!(engine.ledger().balance("X"), Some(950));
}

/// available이 아닌 상품으로 라운드를 시작하면 실제 상태가 드러난다
#[test]
fn start_round_roster_conflict_surfaces_status() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();
    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 50, now).unwrap();
    engine.force_sold(now + Duration::seconds(1)).unwrap();
    let after_dwell = now + Duration::seconds(1) + engine.config().cooldown;
    engine.check_timer(after_dwell).unwrap();

    let err = engine.start_round(Some(1), after_dwell).unwrap_err();
    match err {
        EngineError::RosterConflict(message) => assert!(message.contains("SOLD")),
        other => panic!("RosterConflict가 아님: {:?}", other),
    }
}

// endregion: --- Round Lifecycle

// region:    --- Projections

/// 접속 시 이벤트 이력이 아니라 현재 라운드 스냅샷이 리플레이된다
#[test]
fn connect_replays_round_snapshot() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();
    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 50, now + Duration::seconds(1)).unwrap();

    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    engine
        .connect(Role::Auctioneer, None, tx, now + Duration::seconds(2))
        .unwrap();

    let events = drain(&mut rx);
    let snapshot = events.iter().find_map(|e| match e {
        OutboundEvent::RoundSnapshot { round } => round.as_ref(),
        _ => None,
    });
    let round = snapshot.expect("라운드 스냅샷 없음");
    assert_eq!(round.current_bid, 50);
    assert_eq!(round.current_bidder.as_deref(), Some("X"));

    // 경매사는 로스터 스냅샷도 받는다
    assert!(events
        .iter()
        .any(|e| matches!(e, OutboundEvent::RosterSnapshot { .. })));
}

/// 로스터 스냅샷의 상태별 수는 권위 있는 집계와 일치한다
#[test]
fn roster_snapshot_counts_match() {
    let mut engine = engine_with(
        vec![
            test_item(1, "상품A", 25),
            test_item(2, "상품B", 25),
            test_item(3, "상품C", 25),
        ],
        vec![test_account("X", 1000)],
    );
    let now = t0();

    // 상품 1 낙찰
    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 50, now).unwrap();
    engine.force_sold(now).unwrap();
    engine.check_timer(now + engine.config().cooldown).unwrap();

    // 상품 2 유찰
    engine.start_round(Some(2), now + Duration::seconds(10)).unwrap();
    engine.force_unsold(now + Duration::seconds(11)).unwrap();

    let roster = engine.roster_view();
    assert_eq!(roster.items.len(), 1);
    assert_eq!(roster.sold_items.len(), 1);
    assert_eq!(roster.unsold_items.len(), 1);
    assert_eq!(roster.capital_by_bidder.get("X"), Some(&950));
}

/// 관전자 롤링 로그는 최근 10건 입찰 / 5건 정산을 유지하며
/// 재접속 시 빈 상태로 시작한다
#[test]
fn observer_logs_truncate_and_reset_on_reconnect() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 10000)],
    );
    let now = t0();

    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    let (observer_id, _) = engine.connect(Role::Observer, None, tx, now).unwrap();
    drain(&mut rx);

    engine.start_round(Some(1), now).unwrap();
    for i in 1..=12 {
        engine
            .place_bid("X", 25 + i * 10, now + Duration::seconds(i))
            .unwrap();
    }

    let events = drain(&mut rx);
    let last_digest = events.iter().rev().find_map(|e| match e {
        OutboundEvent::ObserverDigest { bid_log, .. } => Some(bid_log),
        _ => None,
    });
    let bid_log = last_digest.expect("다이제스트 없음");
    assert_eq!(bid_log.len(), 10);
    assert_eq!(bid_log[0].amount, 145); // 최신이 맨 앞

    // 재접속: 로그는 비어 있지만 통계는 세션 전체 값
    engine.force_sold(now + Duration::seconds(20)).unwrap();
    engine.disconnect(observer_id);

    let (tx2, mut rx2) = mpsc::channel(OUTBOUND_BUFFER);
    engine
        .connect(Role::Observer, None, tx2, now + Duration::seconds(30))
        .unwrap();
    let events = drain(&mut rx2);
    let digest = events.iter().find_map(|e| match e {
        OutboundEvent::ObserverDigest {
            bid_log,
            sale_log,
            stats,
            ..
        } => Some((bid_log, sale_log, stats)),
        _ => None,
    });
    let (bid_log, sale_log, stats) = digest.expect("다이제스트 없음");
    assert!(bid_log.is_empty());
    assert!(sale_log.is_empty());
    assert_eq!(stats.items_sold, 1);
    assert_eq!(stats.total_value, 145);
    assert_eq!(stats.highest_sale, 145);
}

/// 입찰자 투영은 자기 자본/보유 상품만 본다
#[test]
fn bidder_projection_hides_other_capital() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25)],
        vec![test_account("X", 1000), test_account("Y", 1000)],
    );
    let now = t0();

    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    engine
        .connect(Role::Bidder, Some("Y".to_string()), tx, now)
        .unwrap();
    drain(&mut rx);

    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 50, now + Duration::seconds(1)).unwrap();
    engine.force_sold(now + Duration::seconds(2)).unwrap();

    // Y 세션에는 로스터 스냅샷(자본 맵)도, X의 BidderState도 오지 않는다
    let events = drain(&mut rx);
    assert!(!events
        .iter()
        .any(|e| matches!(e, OutboundEvent::RosterSnapshot { .. })));
    assert!(!events
        .iter()
        .any(|e| matches!(e, OutboundEvent::BidderState { .. })));
    // 정산 이벤트 자체는 공개 정보
    assert!(events
        .iter()
        .any(|e| matches!(e, OutboundEvent::RoundSettled { .. })));
}

/// 입찰자 신원 없이 접속한 입찰자 세션은 거부된다
#[test]
fn bidder_session_requires_identity() {
    let mut engine = engine_with(Vec::new(), Vec::new());
    let (tx, _rx) = mpsc::channel(OUTBOUND_BUFFER);
    assert!(matches!(
        engine.connect(Role::Bidder, None, tx, t0()),
        Err(EngineError::RosterConflict(_))
    ));
}

/// 자본 보존 불변식: 모든 관측 시점에 balance + 보유 상품 가격 합 == 초기 자본
#[test]
fn capital_conservation_invariant() {
    let mut engine = engine_with(
        vec![test_item(1, "상품A", 25), test_item(2, "상품B", 25)],
        vec![test_account("X", 1000)],
    );
    let now = t0();

    let check = |engine: &AuctionEngine| {
        let spent: i64 = engine.ledger().owned_items("X").iter().map(|o| o.price).sum();
        assert_eq!(engine.ledger().balance("X").unwrap() + spent, 1000);
    };

    check(&engine);
    engine.start_round(Some(1), now).unwrap();
    engine.place_bid("X", 100, now).unwrap();
    check(&engine); // 입찰만으로는 불변
    engine.force_sold(now + Duration::seconds(1)).unwrap();
    check(&engine); // 정산 후에도 보존
}

// endregion: --- Projections

// region:    --- Engine Service (액터 + 저장소)

/// 라운드 사이클: 단일 작성자 루프를 통해 낙찰이 저장소에 반영된다
#[tokio::test]
async fn service_persists_settlement() {
    let store = Arc::new(MemoryRosterStore::new());
    let item = store.seed_item("상품A", "배터", 25);

    let mut engine = AuctionEngine::new(EngineConfig::default());
    engine.load_roster(
        store.load_items().await.unwrap(),
        vec![test_account("X", 1000)],
        Vec::new(),
    );
    let handle = EngineService::spawn(engine, Arc::clone(&store) as Arc<dyn RosterStore>);

    handle.start_round(Some(item.id)).await.unwrap();
    handle.place_bid("X".to_string(), 60).await.unwrap();
    let record = handle.force_sold().await.unwrap();
    assert_eq!(record.amount, Some(60));

    // 저장소 반영은 백그라운드 - 잠시 대기
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

    let (available, sold, unsold) = store.roster_counts().await.unwrap();
    assert_eq!((available, sold, unsold), (0, 1, 0));
    let sales = store.load_sales().await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].price, 60);
    assert_eq!(sales[0].bidder_id, "X");
}

/// 상품 등록은 저장소가 id를 부여하고 전 세션에 브로드캐스트된다
#[tokio::test]
async fn service_add_item_assigns_id_and_broadcasts() {
    let store = Arc::new(MemoryRosterStore::new());
    let engine = AuctionEngine::new(EngineConfig::default());
    let handle = EngineService::spawn(engine, Arc::clone(&store) as Arc<dyn RosterStore>);

    let (tx, mut rx) = mpsc::channel(OUTBOUND_BUFFER);
    handle.connect(Role::Observer, None, tx).await.unwrap();

    let item = handle
        .add_item(AddItemCommand {
            name: "신규 상품".to_string(),
            category: "볼러".to_string(),
            stats: Some(serde_json::json!({ "wickets": 80 })),
            floor_price: None,
            image: None,
        })
        .await
        .unwrap();
    assert_eq!(item.id, 1);
    // floor_price 미지정 시 기본 시작가
    assert_eq!(item.floor_price, 25);

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, OutboundEvent::ItemAdded { item } if item.name == "신규 상품")));
}

/// 신규 입찰자 접속 시 초기 자본 계정이 저장소에 생성된다
#[tokio::test]
async fn service_creates_bidder_account_on_connect() {
    let store = Arc::new(MemoryRosterStore::new());
    let engine = AuctionEngine::new(EngineConfig::default());
    let handle = EngineService::spawn(engine, Arc::clone(&store) as Arc<dyn RosterStore>);

    let (tx, _rx) = mpsc::channel(OUTBOUND_BUFFER);
    handle
        .connect(Role::Bidder, Some("bidder1".to_string()), tx)
        .await
        .unwrap();

    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    let bidders = store.load_bidders().await.unwrap();
    assert_eq!(bidders.len(), 1);
    assert_eq!(bidders[0].capital, 1000);
    assert_eq!(bidders[0].initial_capital, 1000);
}

// endregion: --- Engine Service (액터 + 저장소)
