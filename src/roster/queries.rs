/// 로스터 저장소 SQL
/// 모든 상품 조회
pub const GET_ALL_ITEMS: &str = "SELECT id, name, category, stats, image, floor_price, status, sold_price, winner, created_at FROM items ORDER BY id";

/// 상품 조회
pub const GET_ITEM: &str = "SELECT id, name, category, stats, image, floor_price, status, sold_price, winner, created_at FROM items WHERE id = $1";

/// 상품 등록
pub const INSERT_ITEM: &str = r#"
    INSERT INTO items (name, category, stats, image, floor_price, status, created_at)
    VALUES ($1, $2, $3, $4, $5, 'AVAILABLE', $6)
    RETURNING id, name, category, stats, image, floor_price, status, sold_price, winner, created_at
"#;

/// 모든 입찰자 계정 조회
pub const GET_ALL_BIDDERS: &str =
    "SELECT id, initial_capital, capital, created_at FROM bidders ORDER BY id";

/// 입찰자 계정 생성 (이미 있으면 무시)
pub const INSERT_BIDDER: &str = r#"
    INSERT INTO bidders (id, initial_capital, capital, created_at)
    VALUES ($1, $2, $3, $4)
    ON CONFLICT (id) DO NOTHING
"#;

/// 자본 차감 (정산 시에만)
pub const DEBIT_BIDDER: &str =
    "UPDATE bidders SET capital = capital - $1 WHERE id = $2 AND capital >= $1";

/// 모든 판매 기록 조회
pub const GET_ALL_SALES: &str =
    "SELECT id, item_id, bidder_id, price, sold_at FROM sales ORDER BY sold_at";

/// 판매 기록 추가
pub const INSERT_SALE: &str =
    "INSERT INTO sales (item_id, bidder_id, price, sold_at) VALUES ($1, $2, $3, $4)";

/// 낙찰 처리
pub const MARK_ITEM_SOLD: &str = r#"
    UPDATE items SET status = 'SOLD', sold_price = $1, winner = $2
    WHERE id = $3 AND status = 'AVAILABLE'
"#;

/// 유찰 처리
pub const MARK_ITEM_UNSOLD: &str =
    "UPDATE items SET status = 'UNSOLD' WHERE id = $1 AND status = 'AVAILABLE'";

/// 상태별 상품 수 (available, sold, unsold)
pub const COUNT_BY_STATUS: &str = r#"
    SELECT
        COUNT(*) FILTER (WHERE status = 'AVAILABLE') AS available,
        COUNT(*) FILTER (WHERE status = 'SOLD') AS sold,
        COUNT(*) FILTER (WHERE status = 'UNSOLD') AS unsold
    FROM items
"#;
