// ==========================================
// 禽类订单结算引擎 - 订单数据仓储
// ==========================================
// 对齐: orders / order_sequence 表
// 红线: Repository 不含业务逻辑; 订单写入与变更日志同一事务
// ==========================================

use crate::domain::bird_type::{BirdTypeLabel, SexCounts};
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::order::{ClientSequence, Order, WeighingRecord};
use crate::domain::types::OrderState;
use crate::repository::catalog_repo::lock_conn;
use crate::repository::change_log_repo::insert_entry_on;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_utils::{
    fmt_date, fmt_time, parse_date, parse_enum, parse_json, parse_opt_date, parse_time,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = r#"
    SELECT order_id, order_number, client_number, priority, sub_seq, insertion_seq,
           client_name, bird_base, bird_variety, sex_counts_json,
           presentation, quantity, container_type, order_date, order_time,
           state, cancel_reason,
           gross_weight_kg, container_weight_total_kg, containers_count,
           reweigh_weight_kg, return_weight_kg, driver, delivery_zone,
           ticket_issued, ticket_number, ticket_date
    FROM orders
"#;

const QUEUE_ORDER: &str = "ORDER BY priority, sub_seq, insertion_seq";

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Order> {
        let sex_counts_raw: Option<String> = row.get(9)?;
        let sex_counts: Option<SexCounts> = sex_counts_raw
            .map(|s| parse_json(9, &s))
            .transpose()?;
        let order_date: String = row.get(13)?;
        let order_time: String = row.get(14)?;
        let state_raw: String = row.get(15)?;

        let ticket_issued = row.get::<_, i32>(24)? != 0;
        let weighing = if ticket_issued {
            let ticket_date = parse_opt_date(26, row.get(26)?)?;
            match ticket_date {
                Some(ticket_date) => Some(WeighingRecord {
                    gross_weight_kg: row.get::<_, Option<f64>>(17)?.unwrap_or(0.0),
                    container_weight_total_kg: row.get(18)?,
                    containers_count: row.get(19)?,
                    reweigh_weight_kg: row.get::<_, Option<f64>>(20)?.unwrap_or(0.0),
                    return_weight_kg: row.get::<_, Option<f64>>(21)?.unwrap_or(0.0),
                    driver: row.get(22)?,
                    delivery_zone: row.get(23)?,
                    ticket_number: row.get::<_, Option<String>>(25)?.unwrap_or_default(),
                    ticket_date,
                }),
                None => None,
            }
        } else {
            None
        };

        Ok(Order {
            order_id: row.get(0)?,
            order_number: row.get(1)?,
            client_number: row.get(2)?,
            priority: row.get(3)?,
            sub_seq: row.get(4)?,
            insertion_seq: row.get(5)?,
            client_name: row.get(6)?,
            bird_type: BirdTypeLabel {
                base: row.get(7)?,
                variety: row.get(8)?,
                sex_counts,
            },
            presentation: row.get(10)?,
            quantity: row.get(11)?,
            container_type: row.get(12)?,
            order_date: parse_date(13, &order_date)?,
            order_time: parse_time(14, &order_time)?,
            state: parse_enum(15, &state_raw, OrderState::parse)?,
            cancel_reason: row.get(16)?,
            weighing,
        })
    }

    fn query(&self, filter: &str, args: &[&dyn rusqlite::ToSql]) -> RepositoryResult<Vec<Order>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} {} {}", SELECT_COLUMNS, filter, QUEUE_ORDER);
        let mut stmt = conn.prepare(&sql)?;
        let orders = stmt
            .query_map(args, Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    fn sex_counts_json(order: &Order) -> RepositoryResult<Option<String>> {
        Ok(order
            .bird_type
            .sex_counts
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?)
    }

    fn update_content_on(conn: &Connection, order: &Order) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE orders SET
                bird_base = ?2, bird_variety = ?3, sex_counts_json = ?4,
                presentation = ?5, quantity = ?6, container_type = ?7
            WHERE order_id = ?1
            "#,
            params![
                order.order_id,
                order.bird_type.base,
                order.bird_type.variety,
                Self::sex_counts_json(order)?,
                order.presentation,
                order.quantity,
                order.container_type,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order.order_id.clone(),
            });
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, order_id: &str) -> RepositoryResult<Option<Order>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE order_id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![order_id], Self::map_row).optional()?)
    }

    /// 按 ID 批量查询 (结果按生产队列顺序)
    pub fn find_by_ids(&self, order_ids: &[String]) -> RepositoryResult<Vec<Order>> {
        if order_ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders = order_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let filter = format!("WHERE order_id IN ({})", placeholders);
        let args: Vec<&dyn rusqlite::ToSql> =
            order_ids.iter().map(|id| id as &dyn rusqlite::ToSql).collect();
        self.query(&filter, &args)
    }

    pub fn list_by_date(&self, order_date: NaiveDate) -> RepositoryResult<Vec<Order>> {
        let d = fmt_date(order_date);
        self.query("WHERE order_date = ?1", &[&d])
    }

    pub fn list_by_state(
        &self,
        order_date: NaiveDate,
        state: OrderState,
    ) -> RepositoryResult<Vec<Order>> {
        let d = fmt_date(order_date);
        self.query("WHERE order_date = ?1 AND state = ?2", &[&d, &state.as_str()])
    }

    /// 当天已出磅单的订单
    pub fn list_ticketed_on(&self, ticket_date: NaiveDate) -> RepositoryResult<Vec<Order>> {
        let d = fmt_date(ticket_date);
        self.query("WHERE ticket_issued = 1 AND ticket_date = ?1", &[&d])
    }

    // ==========================================
    // 编号序列
    // ==========================================

    pub fn find_sequence(
        &self,
        order_date: NaiveDate,
        client_name: &str,
    ) -> RepositoryResult<Option<ClientSequence>> {
        let conn = lock_conn(&self.conn)?;
        let seq = conn
            .query_row(
                r#"SELECT priority, last_sub_seq FROM order_sequence
                   WHERE order_date = ?1 AND client_name = ?2"#,
                params![fmt_date(order_date), client_name],
                |row| {
                    Ok(ClientSequence {
                        order_date,
                        client_name: client_name.to_string(),
                        priority: row.get(0)?,
                        last_sub_seq: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(seq)
    }

    /// 当天已使用的最大优先级 (无则为 0)
    pub fn max_priority(&self, order_date: NaiveDate) -> RepositoryResult<i32> {
        let conn = lock_conn(&self.conn)?;
        let max: Option<i32> = conn.query_row(
            "SELECT MAX(priority) FROM order_sequence WHERE order_date = ?1",
            params![fmt_date(order_date)],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0))
    }

    /// 全局录入序号 (只增)
    pub fn next_insertion_seq(&self) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        let max: Option<i64> =
            conn.query_row("SELECT MAX(insertion_seq) FROM orders", [], |row| row.get(0))?;
        Ok(max.unwrap_or(0) + 1)
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入新订单并推进客户编号序列 (事务)
    pub fn insert_with_sequence(
        &self,
        order: &Order,
        seq: &ClientSequence,
    ) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO order_sequence (order_date, client_name, priority, last_sub_seq)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(order_date, client_name) DO UPDATE SET
                last_sub_seq = MAX(order_sequence.last_sub_seq, excluded.last_sub_seq)
            "#,
            params![
                fmt_date(seq.order_date),
                seq.client_name,
                seq.priority,
                seq.last_sub_seq
            ],
        )?;

        tx.execute(
            r#"
            INSERT INTO orders (
                order_id, order_number, client_number, priority, sub_seq, insertion_seq,
                client_name, bird_base, bird_variety, sex_counts_json,
                presentation, quantity, container_type, order_date, order_time,
                state, cancel_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                order.order_id,
                order.order_number,
                order.client_number,
                order.priority,
                order.sub_seq,
                order.insertion_seq,
                order.client_name,
                order.bird_type.base,
                order.bird_type.variety,
                Self::sex_counts_json(order)?,
                order.presentation,
                order.quantity,
                order.container_type,
                fmt_date(order.order_date),
                fmt_time(order.order_time),
                order.state.as_str(),
                order.cancel_reason,
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 状态流转 + 变更日志 (事务)
    ///
    /// 以 `from` 作为乐观校验: 当前状态不是 `from` 时不写入
    pub fn transition_with_log(
        &self,
        order_id: &str,
        from: OrderState,
        to: OrderState,
        cancel_reason: Option<&str>,
        entry: &ChangeLogEntry,
    ) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;

        let rows = tx.execute(
            r#"
            UPDATE orders SET state = ?3, cancel_reason = COALESCE(?4, cancel_reason)
            WHERE order_id = ?1 AND state = ?2
            "#,
            params![order_id, from.as_str(), to.as_str(), cancel_reason],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: format!("Order[state={}]", from),
                id: order_id.to_string(),
            });
        }

        insert_entry_on(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// 更新订单内容 + 变更日志 (事务)
    pub fn update_with_log(&self, order: &Order, entry: &ChangeLogEntry) -> RepositoryResult<()> {
        self.update_many_with_log(std::slice::from_ref(order), entry)
    }

    /// 批量更新订单内容 + 一条变更日志 (事务)
    pub fn update_many_with_log(
        &self,
        orders: &[Order],
        entry: &ChangeLogEntry,
    ) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        for order in orders {
            Self::update_content_on(&tx, order)?;
        }
        insert_entry_on(&tx, entry)?;
        tx.commit()?;
        Ok(())
    }

    /// 合并: 更新保留单, 删除其余订单, 写变更日志 (事务)
    ///
    /// 编号序列不回退, 被删除订单的 sub_seq 不再使用
    pub fn consolidate_with_log(
        &self,
        survivor: &Order,
        removed_ids: &[String],
        entry: &ChangeLogEntry,
    ) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;

        Self::update_content_on(&tx, survivor)?;

        let mut removed = 0;
        for id in removed_ids {
            removed += tx.execute(
                "DELETE FROM orders WHERE order_id = ?1 AND state = ?2",
                params![id, OrderState::Pending.as_str()],
            )?;
        }
        if removed != removed_ids.len() {
            // 事务未提交, 自动回滚
            return Err(RepositoryError::InternalError(format!(
                "合并删除数量不一致: expected={}, actual={}",
                removed_ids.len(),
                removed
            )));
        }

        insert_entry_on(&tx, entry)?;
        tx.commit()?;
        Ok(removed)
    }

    /// 写入称重结果 (出磅单)
    pub fn record_weighing(
        &self,
        order_id: &str,
        weighing: &WeighingRecord,
    ) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        let rows = conn.execute(
            r#"
            UPDATE orders SET
                gross_weight_kg = ?2,
                container_weight_total_kg = ?3,
                containers_count = ?4,
                reweigh_weight_kg = ?5,
                return_weight_kg = ?6,
                driver = ?7,
                delivery_zone = ?8,
                ticket_issued = 1,
                ticket_number = ?9,
                ticket_date = ?10
            WHERE order_id = ?1
            "#,
            params![
                order_id,
                weighing.gross_weight_kg,
                weighing.container_weight_total_kg,
                weighing.containers_count,
                weighing.reweigh_weight_kg,
                weighing.return_weight_kg,
                weighing.driver,
                weighing.delivery_zone,
                weighing.ticket_number,
                fmt_date(weighing.ticket_date),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }
}
