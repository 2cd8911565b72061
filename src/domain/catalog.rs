// ==========================================
// 禽类订单结算引擎 - 基础资料领域模型
// ==========================================
// 客户 / 禽类 / 品相(损耗) / 容器(皮重) / 价格表
// 红线: 基础资料只通过 CatalogApi 修改
// ==========================================

use crate::domain::types::{PresentationKind, Sex};
use serde::{Deserialize, Serialize};

// ==========================================
// Client - 客户
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: String,
    pub name: String,                  // 客户名称 (唯一)
    pub delivery_zone: Option<String>, // 默认配送区域
    pub active: bool,
}

// ==========================================
// BirdType - 禽类
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdType {
    pub bird_type_id: String,
    pub name: String,          // 基础类型名称 (唯一), 对应 BirdTypeLabel.base
    pub has_sex: bool,         // 是否区分公母
    pub has_variety: bool,     // 是否区分品种
    pub varieties: Vec<String>,
}

// ==========================================
// PresentationRule - 品相损耗规则
// ==========================================
// (禽类, 品相[, 品种][, 性别]) → 每单位损耗(kg)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationRule {
    pub rule_id: String,
    pub bird_type_id: String,
    pub presentation: String,
    pub variety: Option<String>,
    pub sex: Option<Sex>,
    pub shrink_per_unit_kg: f64,
}

// ==========================================
// ContainerRule - 容器皮重
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRule {
    pub container_id: String,
    pub container_type: String, // 容器名称 (唯一), 如 "Javas"
    pub tare_kg: f64,
}

// ==========================================
// PriceRule - 价格规则
// ==========================================
// 同一客户+禽类可有多条规则, 由结算引擎按级联顺序解析
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRule {
    pub price_id: String,
    pub client_id: String,
    pub bird_type_id: String,
    pub variety: Option<String>,
    pub sex: Option<Sex>,
    pub price_per_kg: f64,               // 通用单价
    pub price_alive: Option<f64>,        // 活禽单价
    pub price_plucked: Option<f64>,      // 脱毛单价
    pub price_eviscerated: Option<f64>,  // 去内脏单价
}

impl PriceRule {
    /// 按品相选取单价字段, 缺失时回退到通用单价
    pub fn price_for(&self, kind: PresentationKind) -> f64 {
        let specific = match kind {
            PresentationKind::Alive => self.price_alive,
            PresentationKind::Plucked => self.price_plucked,
            PresentationKind::Eviscerated => self.price_eviscerated,
            PresentationKind::Other => None,
        };
        specific.unwrap_or(self.price_per_kg)
    }
}

// ==========================================
// CatalogEvent - 基础资料写入事件
// ==========================================
// 外部 CRUD 界面提交的权威写入, 仅校验主键非空
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CatalogEvent {
    UpsertClient(Client),
    DeleteClient { client_id: String },
    UpsertBirdType(BirdType),
    DeleteBirdType { bird_type_id: String },
    UpsertPresentation(PresentationRule),
    DeletePresentation { rule_id: String },
    UpsertContainer(ContainerRule),
    DeleteContainer { container_id: String },
    UpsertPriceRule(PriceRule),
    DeletePriceRule { price_id: String },
    ReplacePresentations(Vec<PresentationRule>),
    ReplaceContainers(Vec<ContainerRule>),
    ReplacePriceRules(Vec<PriceRule>),
}

impl CatalogEvent {
    /// 事件名称 (日志用)
    pub fn name(&self) -> &'static str {
        match self {
            CatalogEvent::UpsertClient(_) => "UpsertClient",
            CatalogEvent::DeleteClient { .. } => "DeleteClient",
            CatalogEvent::UpsertBirdType(_) => "UpsertBirdType",
            CatalogEvent::DeleteBirdType { .. } => "DeleteBirdType",
            CatalogEvent::UpsertPresentation(_) => "UpsertPresentation",
            CatalogEvent::DeletePresentation { .. } => "DeletePresentation",
            CatalogEvent::UpsertContainer(_) => "UpsertContainer",
            CatalogEvent::DeleteContainer { .. } => "DeleteContainer",
            CatalogEvent::UpsertPriceRule(_) => "UpsertPriceRule",
            CatalogEvent::DeletePriceRule { .. } => "DeletePriceRule",
            CatalogEvent::ReplacePresentations(_) => "ReplacePresentations",
            CatalogEvent::ReplaceContainers(_) => "ReplaceContainers",
            CatalogEvent::ReplacePriceRules(_) => "ReplacePriceRules",
        }
    }
}
