// ==========================================
// 禽类订单结算引擎 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::engine_config_trait::EngineConfigReader;
use crate::db::open_sqlite_connection;
use crate::engine::settlement::{
    DEFAULT_AMOUNT_DECIMALS, DEFAULT_TARE_KG, DEFAULT_WEIGHT_DECIMALS, MAX_DECIMALS,
};
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 会对传入连接再次应用统一 PRAGMA（幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置 (覆盖)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let key = key.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value, updated_at) VALUES ('global', ?1, ?2, datetime('now'))
             ON CONFLICT(scope_id, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 解析数值配置, 格式错误时回退默认值并告警
    fn parse_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error>>
    where
        T: std::str::FromStr + std::fmt::Display + Copy,
    {
        let raw = match self.get_config_value(key)? {
            Some(v) => v,
            None => return Ok(default),
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 小数位配置, 超过上限时回退默认值
    fn decimals_or_default(&self, key: &str, default: u32) -> Result<u32, Box<dyn Error>> {
        let decimals = self.parse_or_default(key, default)?;
        if decimals > MAX_DECIMALS {
            tracing::warn!(config_key = key, decimals, max = MAX_DECIMALS, "小数位超出上限，使用默认值");
            return Ok(default);
        }
        Ok(decimals)
    }
}

// ==========================================
// EngineConfigReader Trait 实现
// ==========================================
impl EngineConfigReader for ConfigManager {
    fn get_default_tare_kg(&self) -> Result<f64, Box<dyn Error>> {
        let tare = self.parse_or_default(config_keys::DEFAULT_TARE_KG, DEFAULT_TARE_KG)?;
        if tare < 0.0 {
            tracing::warn!(config_key = config_keys::DEFAULT_TARE_KG, tare, "皮重不能为负，使用默认值");
            return Ok(DEFAULT_TARE_KG);
        }
        Ok(tare)
    }

    fn get_amount_decimals(&self) -> Result<u32, Box<dyn Error>> {
        self.decimals_or_default(config_keys::AMOUNT_DECIMALS, DEFAULT_AMOUNT_DECIMALS)
    }

    fn get_weight_decimals(&self) -> Result<u32, Box<dyn Error>> {
        self.decimals_or_default(config_keys::WEIGHT_DECIMALS, DEFAULT_WEIGHT_DECIMALS)
    }

    fn get_default_actor(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::DEFAULT_ACTOR, "system")
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 结算
    pub const DEFAULT_TARE_KG: &str = "default_tare_kg";
    pub const AMOUNT_DECIMALS: &str = "amount_decimals";
    pub const WEIGHT_DECIMALS: &str = "weight_decimals";

    // 变更日志
    pub const DEFAULT_ACTOR: &str = "default_actor";
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::ensure_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_unset() {
        let cfg = manager();
        let settings = cfg.settlement_settings().unwrap();
        assert_eq!(settings.default_tare_kg, 2.5);
        assert_eq!(settings.amount_decimals, 2);
        assert_eq!(settings.weight_decimals, 3);
        assert_eq!(cfg.get_default_actor().unwrap(), "system");
    }

    #[test]
    fn test_override_and_bad_values() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::DEFAULT_TARE_KG, "3.25").unwrap();
        cfg.set_global_config_value(config_keys::AMOUNT_DECIMALS, "dos").unwrap();
        assert_eq!(cfg.get_default_tare_kg().unwrap(), 3.25);
        assert_eq!(cfg.get_amount_decimals().unwrap(), 2);

        cfg.set_global_config_value(config_keys::DEFAULT_TARE_KG, "-1").unwrap();
        assert_eq!(cfg.get_default_tare_kg().unwrap(), 2.5);
        assert!(cfg.set_global_config_value("  ", "x").is_err());
    }

    #[test]
    fn test_decimals_above_max_fall_back_to_default() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::AMOUNT_DECIMALS, "400").unwrap();
        cfg.set_global_config_value(config_keys::WEIGHT_DECIMALS, "6").unwrap();
        assert_eq!(cfg.get_amount_decimals().unwrap(), DEFAULT_AMOUNT_DECIMALS);
        assert_eq!(cfg.get_weight_decimals().unwrap(), 6);

        let settings = cfg.settlement_settings().unwrap();
        let total = crate::engine::settlement::round_to(195.0 * 8.5, settings.amount_decimals);
        assert_eq!(total, 1657.5);
    }

    #[test]
    fn test_snapshot_lists_global_keys() {
        let cfg = manager();
        cfg.set_global_config_value(config_keys::DEFAULT_ACTOR, "balanza-1").unwrap();
        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&cfg.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.get("default_actor").map(String::as_str), Some("balanza-1"));
    }
}
