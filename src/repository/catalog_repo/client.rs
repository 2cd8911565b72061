use super::lock_conn;
use crate::domain::catalog::Client;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

// ==========================================
// ClientRepository - 客户仓储
// ==========================================
pub struct ClientRepository {
    conn: Arc<Mutex<Connection>>,
}

/// 客户改名级联结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenameCascade {
    pub orders: usize,
    pub sequences: usize,
    pub settlement_rows: usize,
}

impl ClientRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Client> {
        Ok(Client {
            client_id: row.get(0)?,
            name: row.get(1)?,
            delivery_zone: row.get(2)?,
            active: row.get::<_, i32>(3)? != 0,
        })
    }

    fn upsert_on(conn: &Connection, client: &Client) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO client (client_id, name, delivery_zone, active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(client_id) DO UPDATE SET
                name = excluded.name,
                delivery_zone = excluded.delivery_zone,
                active = excluded.active
            "#,
            params![
                client.client_id,
                client.name,
                client.delivery_zone,
                client.active as i32
            ],
        )
    }

    /// 更新客户, 名称变化时级联到订单/编号序列/未确认结算行
    ///
    /// # 说明
    /// - 已确认的结算行已出账, 保留原名称
    /// - 整体在一个事务内完成
    pub fn update_with_rename_cascade(&self, client: &Client) -> RepositoryResult<RenameCascade> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;

        let old_name: Option<String> = tx
            .query_row(
                "SELECT name FROM client WHERE client_id = ?1",
                params![client.client_id],
                |row| row.get(0),
            )
            .optional()?;

        Self::upsert_on(&tx, client)?;

        let mut cascade = RenameCascade::default();
        if let Some(old) = old_name.filter(|old| old != &client.name) {
            cascade.orders = tx.execute(
                "UPDATE orders SET client_name = ?1 WHERE client_name = ?2",
                params![client.name, old],
            )?;
            cascade.sequences = tx.execute(
                "UPDATE order_sequence SET client_name = ?1 WHERE client_name = ?2",
                params![client.name, old],
            )?;
            cascade.settlement_rows = tx.execute(
                "UPDATE settlement_row SET client = ?1 WHERE client = ?2 AND confirmed = 0",
                params![client.name, old],
            )?;
        }

        tx.commit()?;
        Ok(cascade)
    }

    /// 删除客户及其价格规则
    pub fn delete(&self, client_id: &str) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM price_rule WHERE client_id = ?1", params![client_id])?;
        let rows = tx.execute("DELETE FROM client WHERE client_id = ?1", params![client_id])?;
        tx.commit()?;
        Ok(rows)
    }

    pub fn find_by_id(&self, client_id: &str) -> RepositoryResult<Option<Client>> {
        let conn = lock_conn(&self.conn)?;
        let client = conn
            .query_row(
                "SELECT client_id, name, delivery_zone, active FROM client WHERE client_id = ?1",
                params![client_id],
                Self::map_row,
            )
            .optional()?;
        Ok(client)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Client>> {
        let conn = lock_conn(&self.conn)?;
        let client = conn
            .query_row(
                "SELECT client_id, name, delivery_zone, active FROM client WHERE name = ?1",
                params![name],
                Self::map_row,
            )
            .optional()?;
        Ok(client)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Client>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT client_id, name, delivery_zone, active FROM client ORDER BY name")?;
        let clients = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clients)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM client", [], |row| row.get(0))?)
    }
}
