// ==========================================
// 禽类订单结算引擎 - 结算行数据仓储
// ==========================================
// 对齐: settlement_row 表, 主键 (settle_date, order_id)
// 按营业日分桶: load_day / save_day
// ==========================================

use crate::domain::settlement::SettlementRow;
use crate::repository::catalog_repo::lock_conn;
use crate::repository::error::RepositoryResult;
use crate::repository::row_utils::{fmt_date, fmt_datetime, parse_date, parse_datetime};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT settle_date, order_id, order_number, client, bird_type_label, presentation, quantity,
           shrink_total_kg, container_weight_kg, gross_weight_kg, reweigh_kg, return_weight_kg,
           addition_kg, net_weight_kg, price_per_kg, total_amount, price_unresolved,
           driver, delivery_zone, ticket_number, confirmed, updated_at
    FROM settlement_row
"#;

// ==========================================
// SettlementRowRepository - 结算行仓储
// ==========================================
pub struct SettlementRowRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SettlementRowRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<SettlementRow> {
        let settle_date: String = row.get(0)?;
        let updated_at: String = row.get(21)?;
        Ok(SettlementRow {
            settle_date: parse_date(0, &settle_date)?,
            order_id: row.get(1)?,
            order_number: row.get(2)?,
            client: row.get(3)?,
            bird_type_label: row.get(4)?,
            presentation: row.get(5)?,
            quantity: row.get(6)?,
            shrink_total_kg: row.get(7)?,
            container_weight_kg: row.get(8)?,
            gross_weight_kg: row.get(9)?,
            reweigh_kg: row.get(10)?,
            return_weight_kg: row.get(11)?,
            addition_kg: row.get(12)?,
            net_weight_kg: row.get(13)?,
            price_per_kg: row.get(14)?,
            total_amount: row.get(15)?,
            price_unresolved: row.get::<_, i32>(16)? != 0,
            driver: row.get(17)?,
            delivery_zone: row.get(18)?,
            ticket_number: row.get(19)?,
            confirmed: row.get::<_, i32>(20)? != 0,
            updated_at: parse_datetime(21, &updated_at)?,
        })
    }

    fn upsert_on(conn: &Connection, row: &SettlementRow) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO settlement_row (
                settle_date, order_id, order_number, client, bird_type_label, presentation, quantity,
                shrink_total_kg, container_weight_kg, gross_weight_kg, reweigh_kg, return_weight_kg,
                addition_kg, net_weight_kg, price_per_kg, total_amount, price_unresolved,
                driver, delivery_zone, ticket_number, confirmed, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
            )
            ON CONFLICT(settle_date, order_id) DO UPDATE SET
                order_number = excluded.order_number,
                client = excluded.client,
                bird_type_label = excluded.bird_type_label,
                presentation = excluded.presentation,
                quantity = excluded.quantity,
                shrink_total_kg = excluded.shrink_total_kg,
                container_weight_kg = excluded.container_weight_kg,
                gross_weight_kg = excluded.gross_weight_kg,
                reweigh_kg = excluded.reweigh_kg,
                return_weight_kg = excluded.return_weight_kg,
                addition_kg = excluded.addition_kg,
                net_weight_kg = excluded.net_weight_kg,
                price_per_kg = excluded.price_per_kg,
                total_amount = excluded.total_amount,
                price_unresolved = excluded.price_unresolved,
                driver = excluded.driver,
                delivery_zone = excluded.delivery_zone,
                ticket_number = excluded.ticket_number,
                confirmed = excluded.confirmed,
                updated_at = excluded.updated_at
            "#,
            params![
                fmt_date(row.settle_date),
                row.order_id,
                row.order_number,
                row.client,
                row.bird_type_label,
                row.presentation,
                row.quantity,
                row.shrink_total_kg,
                row.container_weight_kg,
                row.gross_weight_kg,
                row.reweigh_kg,
                row.return_weight_kg,
                row.addition_kg,
                row.net_weight_kg,
                row.price_per_kg,
                row.total_amount,
                row.price_unresolved as i32,
                row.driver,
                row.delivery_zone,
                row.ticket_number,
                row.confirmed as i32,
                fmt_datetime(row.updated_at),
            ],
        )
    }

    /// 读取某营业日全部结算行 (按订单号)
    pub fn load_day(&self, settle_date: NaiveDate) -> RepositoryResult<Vec<SettlementRow>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE settle_date = ?1 ORDER BY rowid", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![fmt_date(settle_date)], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// 整日替换 (事务)
    ///
    /// 只写入 settle_date 等于该日的行
    pub fn save_day(
        &self,
        settle_date: NaiveDate,
        rows: &[SettlementRow],
    ) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM settlement_row WHERE settle_date = ?1",
            params![fmt_date(settle_date)],
        )?;
        let mut count = 0;
        for row in rows.iter().filter(|r| r.settle_date == settle_date) {
            Self::upsert_on(&tx, row)?;
            count += 1;
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn find(
        &self,
        settle_date: NaiveDate,
        order_id: &str,
    ) -> RepositoryResult<Option<SettlementRow>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE settle_date = ?1 AND order_id = ?2", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![fmt_date(settle_date), order_id], Self::map_row)
            .optional()?;
        Ok(row)
    }

    pub fn upsert(&self, row: &SettlementRow) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        Self::upsert_on(&conn, row)?;
        Ok(())
    }
}
