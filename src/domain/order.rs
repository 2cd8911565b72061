// ==========================================
// 禽类订单结算引擎 - 订单领域模型
// ==========================================
// 订单编号: C{priority:03}.{sub_seq}
// 红线: order_number 一经分配不再变化, sub_seq 不复用
// ==========================================

use crate::domain::bird_type::{BirdTypeLabel, SexCounts};
use crate::domain::types::OrderState;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ==========================================
// Order - 订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // ===== 标识 =====
    pub order_id: String,
    pub order_number: String,  // C001.2
    pub client_number: String, // C001
    pub priority: i32,         // 越小越优先
    pub sub_seq: i32,
    pub insertion_seq: i64,    // 同优先级时按录入顺序

    // ===== 订单内容 =====
    pub client_name: String,
    pub bird_type: BirdTypeLabel,
    pub presentation: String,
    pub quantity: i64,         // 活禽为笼数, 其余为只数
    pub container_type: String,
    pub order_date: NaiveDate,
    pub order_time: NaiveTime,
    pub state: OrderState,
    pub cancel_reason: Option<String>,

    // ===== 称重结果 =====
    pub weighing: Option<WeighingRecord>,
}

impl Order {
    /// 是否为子订单 (同一客户当天第二单起)
    pub fn is_sub_order(&self) -> bool {
        self.sub_seq > 1
    }

    /// 是否已出磅单
    pub fn ticket_issued(&self) -> bool {
        self.weighing.is_some()
    }
}

// ==========================================
// WeighingRecord - 称重记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingRecord {
    pub gross_weight_kg: f64,
    pub container_weight_total_kg: Option<f64>, // 缺失时按皮重估算
    pub containers_count: Option<i64>,
    pub reweigh_weight_kg: f64,                 // 0 表示未复磅
    pub return_weight_kg: f64,
    pub driver: Option<String>,
    pub delivery_zone: Option<String>,
    pub ticket_number: String,
    pub ticket_date: NaiveDate,
}

// ==========================================
// WeighingFeed - 磅房推送的称重数据
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeighingFeed {
    pub order_id: String,
    pub gross_weight_kg: f64,
    #[serde(default)]
    pub container_weight_total_kg: Option<f64>,
    #[serde(default)]
    pub containers_count: Option<i64>,
    #[serde(default)]
    pub reweigh_weight_kg: Option<f64>,
    #[serde(default)]
    pub return_weight_kg: Option<f64>,
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub delivery_zone: Option<String>,
    pub ticket_number: String,
    pub ticket_date: NaiveDate,
}

impl WeighingFeed {
    /// 转为称重记录 (缺省复磅/退货按 0)
    pub fn to_record(&self) -> WeighingRecord {
        WeighingRecord {
            gross_weight_kg: self.gross_weight_kg,
            container_weight_total_kg: self.container_weight_total_kg,
            containers_count: self.containers_count,
            reweigh_weight_kg: self.reweigh_weight_kg.unwrap_or(0.0),
            return_weight_kg: self.return_weight_kg.unwrap_or(0.0),
            driver: self.driver.clone(),
            delivery_zone: self.delivery_zone.clone(),
            ticket_number: self.ticket_number.trim().to_string(),
            ticket_date: self.ticket_date,
        }
    }
}

// ==========================================
// NewOrderRequest - 订单录入请求
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub client_name: String,
    pub bird_type: BirdTypeLabel,
    pub presentation: String,
    pub quantity: i64,
    pub container_type: String,
    pub order_date: NaiveDate,
    pub order_time: NaiveTime,
}

// ==========================================
// OrderEdit - 订单修改
// ==========================================
// None 字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderEdit {
    pub quantity: Option<i64>,
    pub presentation: Option<String>,
    pub container_type: Option<String>,
    pub variety: Option<Option<String>>,
    pub sex_counts: Option<Option<SexCounts>>,
}

impl OrderEdit {
    pub fn is_empty(&self) -> bool {
        self.quantity.is_none()
            && self.presentation.is_none()
            && self.container_type.is_none()
            && self.variety.is_none()
            && self.sex_counts.is_none()
    }

    /// 应用到订单 (不做校验)
    pub fn apply_to(&self, order: &mut Order) {
        if let Some(q) = self.quantity {
            order.quantity = q;
        }
        if let Some(p) = &self.presentation {
            order.presentation = p.trim().to_string();
        }
        if let Some(c) = &self.container_type {
            order.container_type = c.trim().to_string();
        }
        if let Some(v) = &self.variety {
            order.bird_type.variety = v.clone();
        }
        if let Some(s) = &self.sex_counts {
            order.bird_type.sex_counts = *s;
        }
    }
}

// ==========================================
// ClientSequence - 客户当日编号序列
// ==========================================
// 每日每客户一条, last_sub_seq 只增不减
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSequence {
    pub order_date: NaiveDate,
    pub client_name: String,
    pub priority: i32,
    pub last_sub_seq: i32,
}
