// ==========================================
// 禽类订单结算引擎 - API 层
// ==========================================
// 职责: 提供业务 API 接口, 组合仓储与引擎
// 并发: 写操作按营业日 / 订单号串行 (KeyedLocks)
// ==========================================

pub mod catalog_api;
pub mod config_api;
pub mod consolidation_api;
pub mod error;
pub mod keyed_lock;
pub mod order_api;
pub mod settlement_api;

// 重导出核心类型
pub use catalog_api::CatalogApi;
pub use config_api::ConfigApi;
pub use consolidation_api::ConsolidationApi;
pub use error::{ApiError, ApiResult};
pub use keyed_lock::KeyedLocks;
pub use order_api::OrderApi;
pub use settlement_api::SettlementApi;

use chrono::{NaiveDateTime, SubsecRound};

/// 当前本地时间 (秒级, 与数据库存储精度一致)
pub(crate) fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local().trunc_subsecs(0)
}
