// ==========================================
// 禽类订单结算引擎 - 引擎层
// ==========================================
// 职责: 实现业务规则 (编号/相似/合并/状态机/结算), 不拼 SQL
// 红线: Engine 不拼 SQL, 输入输出均为领域对象
// ==========================================

pub mod consolidation;
pub mod lifecycle;
pub mod numbering;
pub mod settlement;
pub mod similarity;

// 重导出核心引擎
pub use consolidation::{
    ConsolidationEngine, ConsolidationError, ConsolidationGroup, ConsolidationPlan,
};
pub use lifecycle::{OrderLifecycle, TransitionError};
pub use numbering::{NumberAssignment, OrderNumberingService};
pub use settlement::{
    MatchLevel, PriceResolution, SettlementCalculator, SettlementContext, SettlementRuleError,
    SettlementSettings,
};
pub use similarity::{similar, similar_to_request, SimilarityKey};
