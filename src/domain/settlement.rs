// ==========================================
// 禽类订单结算引擎 - 结算行领域模型
// ==========================================
// 每个订单每个营业日一行
// 红线: confirmed=true 后不可修改, 只能显式"退回编辑"
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ==========================================
// SettlementRow - 结算行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRow {
    // ===== 主键 =====
    pub settle_date: NaiveDate,
    pub order_id: String,

    // ===== 订单快照 =====
    pub order_number: String,
    pub client: String,
    pub bird_type_label: String,
    pub presentation: String,
    pub quantity: i64,

    // ===== 重量 (kg) =====
    pub shrink_total_kg: f64,
    pub container_weight_kg: f64,
    pub gross_weight_kg: f64,
    pub reweigh_kg: f64,
    pub return_weight_kg: f64,
    pub addition_kg: f64,
    pub net_weight_kg: f64,

    // ===== 金额 =====
    pub price_per_kg: f64,
    pub total_amount: f64,
    pub price_unresolved: bool, // 价格未匹配, 待人工补录

    // ===== 配送信息 =====
    pub driver: Option<String>,
    pub delivery_zone: Option<String>,
    pub ticket_number: Option<String>,

    // ===== 状态 =====
    pub confirmed: bool,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// SettlementEdit - 可编辑字段
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SettlementEdit {
    Reweigh(f64),
    ShrinkTotal(f64),
    ReturnWeight(f64),
    AdditionWeight(f64),
    Price(f64),
}

impl SettlementEdit {
    pub fn field_name(&self) -> &'static str {
        match self {
            SettlementEdit::Reweigh(_) => "reweigh_kg",
            SettlementEdit::ShrinkTotal(_) => "shrink_total_kg",
            SettlementEdit::ReturnWeight(_) => "return_weight_kg",
            SettlementEdit::AdditionWeight(_) => "addition_kg",
            SettlementEdit::Price(_) => "price_per_kg",
        }
    }

    pub fn value(&self) -> f64 {
        match *self {
            SettlementEdit::Reweigh(v)
            | SettlementEdit::ShrinkTotal(v)
            | SettlementEdit::ReturnWeight(v)
            | SettlementEdit::AdditionWeight(v)
            | SettlementEdit::Price(v) => v,
        }
    }
}

// ==========================================
// SettlementWarning - 结算警告 (非致命)
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettlementWarning {
    /// 价格未匹配, 已按 0 处理
    UnresolvedPrice {
        order_id: String,
        client: String,
        bird_type: String,
    },
}

// ==========================================
// SettlementOutcome - 结算结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementOutcome {
    pub row: SettlementRow,
    pub warnings: Vec<SettlementWarning>,
}

// ==========================================
// ExportRow - 导出平表
// ==========================================
// 只做字段摊平, 不做计算
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub order_number: String,
    pub client: String,
    pub bird_type: String,
    pub presentation: String,
    pub quantity: i64,
    pub gross_weight_kg: f64,
    pub container_weight_kg: f64,
    pub shrink_total_kg: f64,
    pub reweigh_kg: f64,
    pub return_weight_kg: f64,
    pub addition_kg: f64,
    pub net_weight_kg: f64,
    pub price_per_kg: f64,
    pub total_amount: f64,
    pub delivery_zone: Option<String>,
    pub driver: Option<String>,
    pub confirmed: bool,
}

impl From<&SettlementRow> for ExportRow {
    fn from(row: &SettlementRow) -> Self {
        Self {
            order_number: row.order_number.clone(),
            client: row.client.clone(),
            bird_type: row.bird_type_label.clone(),
            presentation: row.presentation.clone(),
            quantity: row.quantity,
            gross_weight_kg: row.gross_weight_kg,
            container_weight_kg: row.container_weight_kg,
            shrink_total_kg: row.shrink_total_kg,
            reweigh_kg: row.reweigh_kg,
            return_weight_kg: row.return_weight_kg,
            addition_kg: row.addition_kg,
            net_weight_kg: row.net_weight_kg,
            price_per_kg: row.price_per_kg,
            total_amount: row.total_amount,
            delivery_zone: row.delivery_zone.clone(),
            driver: row.driver.clone(),
            confirmed: row.confirmed,
        }
    }
}

// ==========================================
// ExportFilter / ExportSort - 导出筛选与排序
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportFilter {
    pub client: Option<String>,
    pub delivery_zone: Option<String>,
    pub driver: Option<String>,
    pub confirmed_only: bool,
}

impl ExportFilter {
    pub fn matches(&self, row: &SettlementRow) -> bool {
        if let Some(c) = &self.client {
            if &row.client != c {
                return false;
            }
        }
        if let Some(z) = &self.delivery_zone {
            if row.delivery_zone.as_ref() != Some(z) {
                return false;
            }
        }
        if let Some(d) = &self.driver {
            if row.driver.as_ref() != Some(d) {
                return false;
            }
        }
        !self.confirmed_only || row.confirmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExportSort {
    #[default]
    OrderNumber,
    Client,
    TotalDesc,
    DeliveryZone,
}
