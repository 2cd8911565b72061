use super::lock_conn;
use crate::domain::catalog::{ContainerRule, PresentationRule, PriceRule};
use crate::repository::error::RepositoryResult;
use crate::repository::row_utils::parse_sex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// PresentationRuleRepository - 品相损耗规则仓储
// ==========================================
pub struct PresentationRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

const PRESENTATION_COLUMNS: &str =
    "SELECT rule_id, bird_type_id, presentation, variety, sex, shrink_per_unit_kg FROM presentation_rule";

impl PresentationRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<PresentationRule> {
        Ok(PresentationRule {
            rule_id: row.get(0)?,
            bird_type_id: row.get(1)?,
            presentation: row.get(2)?,
            variety: row.get(3)?,
            sex: parse_sex(4, row.get(4)?)?,
            shrink_per_unit_kg: row.get(5)?,
        })
    }

    fn upsert_on(conn: &Connection, rule: &PresentationRule) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO presentation_rule (rule_id, bird_type_id, presentation, variety, sex, shrink_per_unit_kg)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(rule_id) DO UPDATE SET
                bird_type_id = excluded.bird_type_id,
                presentation = excluded.presentation,
                variety = excluded.variety,
                sex = excluded.sex,
                shrink_per_unit_kg = excluded.shrink_per_unit_kg
            "#,
            params![
                rule.rule_id,
                rule.bird_type_id,
                rule.presentation,
                rule.variety,
                rule.sex.map(|s| s.as_str()),
                rule.shrink_per_unit_kg,
            ],
        )
    }

    pub fn upsert(&self, rule: &PresentationRule) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        Self::upsert_on(&conn, rule)?;
        Ok(())
    }

    pub fn delete(&self, rule_id: &str) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute("DELETE FROM presentation_rule WHERE rule_id = ?1", params![rule_id])?)
    }

    /// 整表替换 (事务)
    pub fn replace_all(&self, rules: &[PresentationRule]) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM presentation_rule", [])?;
        for rule in rules {
            Self::upsert_on(&tx, rule)?;
        }
        tx.commit()?;
        Ok(rules.len())
    }

    /// 查询某禽类的全部损耗规则
    pub fn list_for_bird_type(
        &self,
        bird_type_id: &str,
    ) -> RepositoryResult<Vec<PresentationRule>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} WHERE bird_type_id = ?1 ORDER BY rowid", PRESENTATION_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map(params![bird_type_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<PresentationRule>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} ORDER BY rowid", PRESENTATION_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }
}

// ==========================================
// ContainerRuleRepository - 容器皮重仓储
// ==========================================
pub struct ContainerRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ContainerRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ContainerRule> {
        Ok(ContainerRule {
            container_id: row.get(0)?,
            container_type: row.get(1)?,
            tare_kg: row.get(2)?,
        })
    }

    fn upsert_on(conn: &Connection, rule: &ContainerRule) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO container_rule (container_id, container_type, tare_kg)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(container_id) DO UPDATE SET
                container_type = excluded.container_type,
                tare_kg = excluded.tare_kg
            "#,
            params![rule.container_id, rule.container_type, rule.tare_kg],
        )
    }

    pub fn upsert(&self, rule: &ContainerRule) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        Self::upsert_on(&conn, rule)?;
        Ok(())
    }

    pub fn delete(&self, container_id: &str) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute(
            "DELETE FROM container_rule WHERE container_id = ?1",
            params![container_id],
        )?)
    }

    pub fn replace_all(&self, rules: &[ContainerRule]) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM container_rule", [])?;
        for rule in rules {
            Self::upsert_on(&tx, rule)?;
        }
        tx.commit()?;
        Ok(rules.len())
    }

    pub fn find_by_type(&self, container_type: &str) -> RepositoryResult<Option<ContainerRule>> {
        let conn = lock_conn(&self.conn)?;
        let rule = conn
            .query_row(
                "SELECT container_id, container_type, tare_kg FROM container_rule WHERE container_type = ?1",
                params![container_type],
                Self::map_row,
            )
            .optional()?;
        Ok(rule)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<ContainerRule>> {
        let conn = lock_conn(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT container_id, container_type, tare_kg FROM container_rule ORDER BY container_type",
        )?;
        let rules = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }
}

// ==========================================
// PriceRuleRepository - 价格规则仓储
// ==========================================
// seq 保留录入顺序 ("第一条规则" 的口径)
pub struct PriceRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

const PRICE_COLUMNS: &str = r#"
    SELECT price_id, client_id, bird_type_id, variety, sex,
           price_per_kg, price_alive, price_plucked, price_eviscerated
    FROM price_rule
"#;

impl PriceRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<PriceRule> {
        Ok(PriceRule {
            price_id: row.get(0)?,
            client_id: row.get(1)?,
            bird_type_id: row.get(2)?,
            variety: row.get(3)?,
            sex: parse_sex(4, row.get(4)?)?,
            price_per_kg: row.get(5)?,
            price_alive: row.get(6)?,
            price_plucked: row.get(7)?,
            price_eviscerated: row.get(8)?,
        })
    }

    fn upsert_on(conn: &Connection, rule: &PriceRule) -> rusqlite::Result<usize> {
        conn.execute(
            r#"
            INSERT INTO price_rule (
                price_id, client_id, bird_type_id, variety, sex,
                price_per_kg, price_alive, price_plucked, price_eviscerated, seq
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM price_rule)
            )
            ON CONFLICT(price_id) DO UPDATE SET
                client_id = excluded.client_id,
                bird_type_id = excluded.bird_type_id,
                variety = excluded.variety,
                sex = excluded.sex,
                price_per_kg = excluded.price_per_kg,
                price_alive = excluded.price_alive,
                price_plucked = excluded.price_plucked,
                price_eviscerated = excluded.price_eviscerated
            "#,
            params![
                rule.price_id,
                rule.client_id,
                rule.bird_type_id,
                rule.variety,
                rule.sex.map(|s| s.as_str()),
                rule.price_per_kg,
                rule.price_alive,
                rule.price_plucked,
                rule.price_eviscerated,
            ],
        )
    }

    pub fn upsert(&self, rule: &PriceRule) -> RepositoryResult<()> {
        let conn = lock_conn(&self.conn)?;
        Self::upsert_on(&conn, rule)?;
        Ok(())
    }

    pub fn delete(&self, price_id: &str) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        Ok(conn.execute("DELETE FROM price_rule WHERE price_id = ?1", params![price_id])?)
    }

    pub fn replace_all(&self, rules: &[PriceRule]) -> RepositoryResult<usize> {
        let conn = lock_conn(&self.conn)?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM price_rule", [])?;
        for rule in rules {
            Self::upsert_on(&tx, rule)?;
        }
        tx.commit()?;
        Ok(rules.len())
    }

    /// 查询客户+禽类的全部价格规则 (保持录入顺序)
    pub fn list_for(
        &self,
        client_id: &str,
        bird_type_id: &str,
    ) -> RepositoryResult<Vec<PriceRule>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!(
            "{} WHERE client_id = ?1 AND bird_type_id = ?2 ORDER BY seq, rowid",
            PRICE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map(params![client_id, bird_type_id], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<PriceRule>> {
        let conn = lock_conn(&self.conn)?;
        let sql = format!("{} ORDER BY seq, rowid", PRICE_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }
}
