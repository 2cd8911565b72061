use super::lock_conn;
use crate::domain::catalog::BirdType;
use crate::repository::error::RepositoryResult;
use crate::repository::row_utils::parse_json;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// BirdTypeRepository - 禽类仓储
// ==========================================
pub struct BirdTypeRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "SELECT bird_type_id, name, has_sex, has_variety, varieties_json FROM bird_type";

impl BirdTypeRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<BirdType> {
        let varieties_raw: String = row.get(4)?;
        Ok(BirdType {
            bird_type_id: row.get(0)?,
            name: row.get(1)?,
            has_sex: row.get::<_, i32>(2)? != 0,
            has_variety: row.get::<_, i32>(3)? != 0,
            varieties: parse_json(4, &varieties_raw)?,
        })
    }

    fn upsert_on(conn: &Connection, bird_type: &BirdType) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO bird_type (bird_type_id, name, has_sex, has_variety, varieties_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(bird_type_id) DO UPDATE SET
                name = excluded.name,
                has_sex = excluded.has_sex,
                has_variety = excluded.has_variety,
                varieties_json = excluded.varieties_json
            "#,
            params![
                bird_type.bird_type_id,
                bird_type.name,
                bird_type.has_sex as i32,
                bird_type.has_variety as i32,
                serde_json::to_string(&bird_type.varieties)?,
            ],
        )?;
        Ok(())
    }

    /// 更新禽类, 名称变化时级联到订单的 bird_base
    ///
    /// # 返回
    /// - Ok(usize): 被改名的订单数
    pub fn update_with_rename_cascade(&self, bird_type: &BirdType) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;

        let old_name: Option<String> = tx
            .query_row(
                "SELECT name FROM bird_type WHERE bird_type_id = ?1",
                params![bird_type.bird_type_id],
                |row| row.get(0),
            )
            .optional()?;

        Self::upsert_on(&tx, bird_type)?;

        let mut renamed = 0;
        if let Some(old) = old_name.filter(|old| old != &bird_type.name) {
            renamed = tx.execute(
                "UPDATE orders SET bird_base = ?1 WHERE bird_base = ?2",
                params![bird_type.name, old],
            )?;
        }

        tx.commit()?;
        Ok(renamed)
    }

    /// 删除禽类及其损耗/价格规则
    pub fn delete(&self, bird_type_id: &str) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute(
            "DELETE FROM presentation_rule WHERE bird_type_id = ?1",
            params![bird_type_id],
        )?;
        tx.execute("DELETE FROM price_rule WHERE bird_type_id = ?1", params![bird_type_id])?;
        let rows = tx.execute(
            "DELETE FROM bird_type WHERE bird_type_id = ?1",
            params![bird_type_id],
        )?;
        tx.commit()?;
        Ok(rows)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<BirdType>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![name], Self::map_row).optional()?)
    }

    pub fn find_by_id(&self, bird_type_id: &str) -> RepositoryResult<Option<BirdType>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE bird_type_id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![bird_type_id], Self::map_row).optional()?)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<BirdType>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} ORDER BY name", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn count(&self) -> RepositoryResult<i64> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.query_row("SELECT COUNT(*) FROM bird_type", [], |row| row.get(0))?)
    }
}
