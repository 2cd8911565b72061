// ==========================================
// 禽类订单结算引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 所有仓储共享同一个 Arc<Mutex<Connection>>
// ==========================================

pub mod catalog_repo;
pub mod change_log_repo;
pub mod error;
pub mod order_repo;
pub mod row_utils;
pub mod settlement_repo;

// 重导出核心仓储
pub use catalog_repo::{
    BirdTypeRepository, ClientRepository, ContainerRuleRepository, PresentationRuleRepository,
    PriceRuleRepository, RenameCascade,
};
pub use change_log_repo::ChangeLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use order_repo::OrderRepository;
pub use settlement_repo::SettlementRowRepository;
