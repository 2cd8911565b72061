// ==========================================
// 禽类订单结算引擎 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 约束: 所有仓储共享一个连接; 日期锁/订单锁在各 API 间共享
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{
    CatalogApi, ConfigApi, ConsolidationApi, KeyedLocks, OrderApi, SettlementApi,
};
use crate::config::config_manager::ConfigManager;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::db::{ensure_schema, open_sqlite_connection};
use crate::repository::{
    BirdTypeRepository, ChangeLogRepository, ClientRepository, ContainerRuleRepository,
    OrderRepository, PresentationRuleRepository, PriceRuleRepository, SettlementRowRepository,
};

/// 应用状态
///
/// 包含所有API实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 基础资料API
    pub catalog_api: Arc<CatalogApi>,

    /// 订单API
    pub order_api: Arc<OrderApi>,

    /// 订单合并API
    pub consolidation_api: Arc<ConsolidationApi>,

    /// 结算API
    pub settlement_api: Arc<SettlementApi>,

    /// 配置管理API
    pub config_api: Arc<ConfigApi>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// 打开数据库并建表 (幂等), 然后装配 Repository / API
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| format!("无法打开数据库: {}", e))?;
        ensure_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let client_repo = Arc::new(ClientRepository::new(conn.clone()));
        let bird_type_repo = Arc::new(BirdTypeRepository::new(conn.clone()));
        let presentation_repo = Arc::new(PresentationRuleRepository::new(conn.clone()));
        let container_repo = Arc::new(ContainerRuleRepository::new(conn.clone()));
        let price_repo = Arc::new(PriceRuleRepository::new(conn.clone()));
        let order_repo = Arc::new(OrderRepository::new(conn.clone()));
        let change_log_repo = Arc::new(ChangeLogRepository::new(conn.clone()));
        let settlement_repo = Arc::new(SettlementRowRepository::new(conn.clone()));

        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config: Arc<dyn EngineConfigReader> = config_manager.clone();

        // 跨 API 共享的串行锁
        let date_locks = Arc::new(KeyedLocks::new());
        let order_locks = Arc::new(KeyedLocks::new());

        // ==========================================
        // 初始化API层
        // ==========================================
        let catalog_api = Arc::new(CatalogApi::new(
            client_repo.clone(),
            bird_type_repo.clone(),
            presentation_repo.clone(),
            container_repo.clone(),
            price_repo.clone(),
        ));

        let order_api = Arc::new(OrderApi::new(
            order_repo.clone(),
            change_log_repo,
            client_repo.clone(),
            bird_type_repo.clone(),
            config.clone(),
            date_locks.clone(),
            order_locks.clone(),
        ));

        let consolidation_api = Arc::new(ConsolidationApi::new(
            order_repo.clone(),
            config.clone(),
            date_locks.clone(),
        ));

        let settlement_api = Arc::new(SettlementApi::new(
            settlement_repo,
            order_repo,
            client_repo,
            bird_type_repo,
            presentation_repo,
            container_repo,
            price_repo,
            config,
            date_locks,
            order_locks,
        ));

        let config_api = Arc::new(ConfigApi::new(config_manager));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            catalog_api,
            order_api,
            consolidation_api,
            settlement_api,
            config_api,
        })
    }

    pub fn db_path(&self) -> &str {
        &self.db_path
    }
}

// ==========================================
// 默认数据库路径辅助函数
// ==========================================

/// 获取默认数据库路径
///
/// 优先 POULTRY_SETTLEMENT_DB_PATH, 否则 用户数据目录/poultry-settlement/poultry_settlement.db
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("POULTRY_SETTLEMENT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./poultry_settlement.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("poultry-settlement");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("poultry_settlement.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_bootstraps_empty_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let state = AppState::new(file.path().to_string_lossy().to_string()).unwrap();
        assert!(state.catalog_api.list_clients().unwrap().is_empty());
        assert!(state.config_api.get_config_snapshot().unwrap().starts_with('{'));
    }
}
