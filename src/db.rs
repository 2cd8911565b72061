// ==========================================
// 禽类订单结算引擎 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表脚本幂等, 启动时执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 日期存储格式
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// 时间存储格式
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// 时间戳存储格式
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 全量建表脚本
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

CREATE TABLE IF NOT EXISTS client (
    client_id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    delivery_zone TEXT,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS bird_type (
    bird_type_id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    has_sex INTEGER NOT NULL DEFAULT 0,
    has_variety INTEGER NOT NULL DEFAULT 0,
    varieties_json TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS presentation_rule (
    rule_id TEXT PRIMARY KEY,
    bird_type_id TEXT NOT NULL,
    presentation TEXT NOT NULL,
    variety TEXT,
    sex TEXT,
    shrink_per_unit_kg REAL NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS container_rule (
    container_id TEXT PRIMARY KEY,
    container_type TEXT NOT NULL UNIQUE,
    tare_kg REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS price_rule (
    price_id TEXT PRIMARY KEY,
    client_id TEXT NOT NULL,
    bird_type_id TEXT NOT NULL,
    variety TEXT,
    sex TEXT,
    price_per_kg REAL NOT NULL DEFAULT 0,
    price_alive REAL,
    price_plucked REAL,
    price_eviscerated REAL,
    seq INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS order_sequence (
    order_date TEXT NOT NULL,
    client_name TEXT NOT NULL,
    priority INTEGER NOT NULL,
    last_sub_seq INTEGER NOT NULL,
    PRIMARY KEY (order_date, client_name)
);

CREATE TABLE IF NOT EXISTS orders (
    order_id TEXT PRIMARY KEY,
    order_number TEXT NOT NULL,
    client_number TEXT NOT NULL,
    priority INTEGER NOT NULL,
    sub_seq INTEGER NOT NULL,
    insertion_seq INTEGER NOT NULL,
    client_name TEXT NOT NULL,
    bird_base TEXT NOT NULL,
    bird_variety TEXT,
    sex_counts_json TEXT,
    presentation TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    container_type TEXT NOT NULL,
    order_date TEXT NOT NULL,
    order_time TEXT NOT NULL,
    state TEXT NOT NULL,
    cancel_reason TEXT,
    gross_weight_kg REAL,
    container_weight_total_kg REAL,
    containers_count INTEGER,
    reweigh_weight_kg REAL,
    return_weight_kg REAL,
    driver TEXT,
    delivery_zone TEXT,
    ticket_issued INTEGER NOT NULL DEFAULT 0,
    ticket_number TEXT,
    ticket_date TEXT,
    UNIQUE (order_date, order_number)
);

CREATE INDEX IF NOT EXISTS idx_orders_date_state ON orders(order_date, state);
CREATE INDEX IF NOT EXISTS idx_orders_ticket_date ON orders(ticket_date);

CREATE TABLE IF NOT EXISTS change_log (
    entry_id TEXT PRIMARY KEY,
    order_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    quantity_before INTEGER,
    quantity_after INTEGER,
    state_before TEXT,
    state_after TEXT,
    log_date TEXT NOT NULL,
    log_time TEXT NOT NULL,
    reason TEXT,
    details_json TEXT,
    affected_order_numbers_json TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_change_log_order ON change_log(order_id);
CREATE INDEX IF NOT EXISTS idx_change_log_date ON change_log(log_date);

CREATE TABLE IF NOT EXISTS settlement_row (
    settle_date TEXT NOT NULL,
    order_id TEXT NOT NULL,
    order_number TEXT NOT NULL,
    client TEXT NOT NULL,
    bird_type_label TEXT NOT NULL,
    presentation TEXT NOT NULL,
    quantity INTEGER NOT NULL,
    shrink_total_kg REAL NOT NULL,
    container_weight_kg REAL NOT NULL,
    gross_weight_kg REAL NOT NULL,
    reweigh_kg REAL NOT NULL,
    return_weight_kg REAL NOT NULL,
    addition_kg REAL NOT NULL,
    net_weight_kg REAL NOT NULL,
    price_per_kg REAL NOT NULL,
    total_amount REAL NOT NULL,
    price_unresolved INTEGER NOT NULL DEFAULT 0,
    driver TEXT,
    delivery_zone TEXT,
    ticket_number TEXT,
    confirmed INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (settle_date, order_id)
);
"#;

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

/// 建表（幂等）并记录 schema_version
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), None);
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
