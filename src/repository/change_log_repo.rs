// ==========================================
// 禽类订单结算引擎 - 变更日志数据仓储
// ==========================================
// 对齐: change_log 表
// 红线: 只追加, 不提供更新/删除
// ==========================================

use crate::domain::change_log::ChangeLogEntry;
use crate::domain::types::{ChangeKind, OrderState};
use crate::repository::catalog_repo::lock_conn;
use crate::repository::error::RepositoryResult;
use crate::repository::row_utils::{
    fmt_date, fmt_time, parse_date, parse_enum, parse_json, parse_time,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT entry_id, order_id, kind, quantity_before, quantity_after,
           state_before, state_after, log_date, log_time, reason,
           details_json, affected_order_numbers_json
    FROM change_log
"#;

/// 在给定连接/事务上写入一条变更日志
///
/// 供订单仓储在同一事务内调用 (状态流转、合并等)
pub(crate) fn insert_entry_on(conn: &Connection, entry: &ChangeLogEntry) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO change_log (
            entry_id, order_id, kind, quantity_before, quantity_after,
            state_before, state_after, log_date, log_time, reason,
            details_json, affected_order_numbers_json
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            entry.entry_id,
            entry.order_id,
            entry.kind.as_str(),
            entry.quantity_before,
            entry.quantity_after,
            entry.state_before.map(|s| s.as_str()),
            entry.state_after.map(|s| s.as_str()),
            fmt_date(entry.log_date),
            fmt_time(entry.log_time),
            entry.reason,
            entry.details.as_ref().map(|v| v.to_string()),
            serde_json::to_string(&entry.affected_order_numbers)?,
        ],
    )?;
    Ok(())
}

// ==========================================
// ChangeLogRepository - 变更日志仓储
// ==========================================
pub struct ChangeLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ChangeLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ChangeLogEntry> {
        let kind_raw: String = row.get(2)?;
        let state_before: Option<String> = row.get(5)?;
        let state_after: Option<String> = row.get(6)?;
        let log_date: String = row.get(7)?;
        let log_time: String = row.get(8)?;
        let details: Option<String> = row.get(10)?;
        let affected: String = row.get(11)?;

        Ok(ChangeLogEntry {
            entry_id: row.get(0)?,
            order_id: row.get(1)?,
            kind: parse_enum(2, &kind_raw, ChangeKind::parse)?,
            quantity_before: row.get(3)?,
            quantity_after: row.get(4)?,
            state_before: state_before
                .map(|s| parse_enum(5, &s, OrderState::parse))
                .transpose()?,
            state_after: state_after
                .map(|s| parse_enum(6, &s, OrderState::parse))
                .transpose()?,
            log_date: parse_date(7, &log_date)?,
            log_time: parse_time(8, &log_time)?,
            reason: row.get(9)?,
            details: details.map(|d| parse_json(10, &d)).transpose()?,
            affected_order_numbers: parse_json(11, &affected)?,
        })
    }

    fn query(
        &self,
        filter: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> RepositoryResult<Vec<ChangeLogEntry>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} {} ORDER BY log_date, log_time, rowid", SELECT_COLUMNS, filter);
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(args, Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// 插入变更日志
    pub fn insert(&self, entry: &ChangeLogEntry) -> RepositoryResult<String> {
        let conn = lock_conn(&self.conn)?;
        insert_entry_on(&conn, entry)?;
        Ok(entry.entry_id.clone())
    }

    /// 按订单查询 (含该订单作为被合并单出现的记录)
    pub fn find_by_order(&self, order_id: &str) -> RepositoryResult<Vec<ChangeLogEntry>> {
        self.query("WHERE order_id = ?1", &[&order_id])
    }

    pub fn find_by_date(&self, date: NaiveDate) -> RepositoryResult<Vec<ChangeLogEntry>> {
        let d = fmt_date(date);
        self.query("WHERE log_date = ?1", &[&d])
    }

    pub fn find_by_kind(&self, kind: ChangeKind) -> RepositoryResult<Vec<ChangeLogEntry>> {
        self.query("WHERE kind = ?1", &[&kind.as_str()])
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<ChangeLogEntry>> {
        self.query("", &[])
    }
}
