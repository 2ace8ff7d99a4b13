// ==========================================
// UMKM 餐饮经营自动化 - SQLite 连接初始化与建表
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 提供幂等建表 ensure_schema，供主程序、种子数据与测试共用
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等建表（CREATE TABLE IF NOT EXISTS）并登记 schema_version
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS ingredient (
    ingredient_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    unit TEXT NOT NULL,
    current_stock REAL NOT NULL DEFAULT 0 CHECK (current_stock >= 0),
    min_stock REAL NOT NULL DEFAULT 0 CHECK (min_stock >= 0),
    price_per_unit REAL CHECK (price_per_unit IS NULL OR price_per_unit >= 0),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS recipe (
    recipe_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    servings INTEGER NOT NULL CHECK (servings >= 1),
    prep_time_minutes INTEGER NOT NULL DEFAULT 0,
    cook_time_minutes INTEGER NOT NULL DEFAULT 0,
    selling_price REAL
);

CREATE TABLE IF NOT EXISTS recipe_ingredient (
    recipe_id TEXT NOT NULL REFERENCES recipe(recipe_id) ON DELETE CASCADE,
    ingredient_id TEXT NOT NULL REFERENCES ingredient(ingredient_id),
    quantity REAL NOT NULL CHECK (quantity >= 0),
    unit TEXT NOT NULL,
    PRIMARY KEY (recipe_id, ingredient_id)
);
CREATE INDEX IF NOT EXISTS idx_recipe_ingredient_ingredient
    ON recipe_ingredient(ingredient_id);

CREATE TABLE IF NOT EXISTS operational_cost (
    cost_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    period TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    auto_allocate INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS customer_order (
    order_id TEXT PRIMARY KEY,
    order_no TEXT NOT NULL,
    customer_id TEXT,
    customer_name TEXT,
    status TEXT NOT NULL,
    delivery_at TEXT,
    total_amount REAL NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_customer_order_delivery ON customer_order(delivery_at);

CREATE TABLE IF NOT EXISTS order_item (
    item_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL REFERENCES customer_order(order_id) ON DELETE CASCADE,
    recipe_id TEXT NOT NULL,
    quantity INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_order_item_order ON order_item(order_id);

CREATE TABLE IF NOT EXISTS recipe_cost (
    recipe_id TEXT PRIMARY KEY,
    recipe_name TEXT NOT NULL,
    material_cost REAL NOT NULL,
    labor_cost REAL NOT NULL,
    overhead_cost REAL NOT NULL,
    total_cost REAL NOT NULL,
    cost_per_serving REAL NOT NULL,
    missing_prices_json TEXT NOT NULL DEFAULT '[]',
    last_calculated TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notification (
    notification_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    priority TEXT NOT NULL,
    title TEXT NOT NULL,
    message TEXT NOT NULL,
    data_json TEXT NOT NULL DEFAULT 'null',
    created_at TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_notification_created ON notification(created_at);

CREATE TABLE IF NOT EXISTS stock_transaction (
    tx_id TEXT PRIMARY KEY,
    ingredient_id TEXT NOT NULL,
    quantity REAL NOT NULL,
    kind TEXT NOT NULL,
    reference TEXT NOT NULL,
    unit_price REAL,
    occurred_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_stock_transaction_ingredient
    ON stock_transaction(ingredient_id, occurred_at);
CREATE INDEX IF NOT EXISTS idx_stock_transaction_reference
    ON stock_transaction(reference);

CREATE TABLE IF NOT EXISTS financial_record (
    record_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    amount REAL NOT NULL,
    reference TEXT NOT NULL,
    description TEXT NOT NULL,
    record_date TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_financial_record_reference ON financial_record(reference);

CREATE TABLE IF NOT EXISTS customer_stats (
    customer_id TEXT PRIMARY KEY,
    total_orders INTEGER NOT NULL DEFAULT 0,
    total_spent REAL NOT NULL DEFAULT 0,
    average_order_value REAL NOT NULL DEFAULT 0,
    last_order_date TEXT
);
"#;
