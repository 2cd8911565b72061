// ==========================================
// 禽类订单结算引擎 - 领域模型层
// ==========================================
// 职责: 定义领域实体、值对象、枚举类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod bird_type;
pub mod catalog;
pub mod change_log;
pub mod order;
pub mod settlement;
pub mod types;

// 重导出核心类型
pub use bird_type::{BirdTypeLabel, SexCounts};
pub use catalog::{BirdType, CatalogEvent, Client, ContainerRule, PresentationRule, PriceRule};
pub use change_log::ChangeLogEntry;
pub use order::{ClientSequence, NewOrderRequest, Order, OrderEdit, WeighingFeed, WeighingRecord};
pub use settlement::{
    ExportFilter, ExportRow, ExportSort, SettlementEdit, SettlementOutcome, SettlementRow,
    SettlementWarning,
};
pub use types::{ChangeKind, OrderState, PresentationKind, Sex};
