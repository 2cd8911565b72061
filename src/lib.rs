// ==========================================
// 禽类订单结算引擎 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 范围: 订单编号/合并、状态流转、称重结算、变更日志
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ChangeKind, OrderState, PresentationKind, Sex};

// 领域实体
pub use domain::{
    BirdType, BirdTypeLabel, CatalogEvent, ChangeLogEntry, Client, ContainerRule, NewOrderRequest,
    Order, OrderEdit, PresentationRule, PriceRule, SettlementEdit, SettlementOutcome,
    SettlementRow, SexCounts, WeighingFeed,
};

// 引擎
pub use engine::{
    ConsolidationEngine, OrderLifecycle, OrderNumberingService, SettlementCalculator,
};

// API
pub use api::{ApiError, ApiResult, CatalogApi, ConsolidationApi, OrderApi, SettlementApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "禽类订单结算引擎";
