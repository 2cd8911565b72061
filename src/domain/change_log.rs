// ==========================================
// 禽类订单结算引擎 - 变更日志领域模型
// ==========================================
// 红线: 订单的每次写入必须记录, 只追加不修改
// 用途: 审计追踪 (由外部审计模块读取)
// 对齐: change_log 表
// ==========================================

use crate::domain::types::{ChangeKind, OrderState};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ChangeLogEntry - 变更日志
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    // ===== 主键 =====
    pub entry_id: String,
    pub order_id: String, // 主订单 (合并时为保留单)
    pub kind: ChangeKind,

    // ===== 数量变化 =====
    pub quantity_before: Option<i64>,
    pub quantity_after: Option<i64>,

    // ===== 状态变化 =====
    pub state_before: Option<OrderState>,
    pub state_after: Option<OrderState>,

    // ===== 时间 =====
    pub log_date: NaiveDate,
    pub log_time: NaiveTime,

    // ===== 说明 =====
    pub reason: Option<String>,
    pub details: Option<JsonValue>,
    pub affected_order_numbers: Vec<String>,
}

impl ChangeLogEntry {
    /// 创建新的变更日志 (ID 为 UUID, 时间为传入时刻)
    pub fn new(order_id: &str, kind: ChangeKind, at: NaiveDateTime) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            kind,
            quantity_before: None,
            quantity_after: None,
            state_before: None,
            state_after: None,
            log_date: at.date(),
            log_time: at.time(),
            reason: None,
            details: None,
            affected_order_numbers: vec![],
        }
    }

    pub fn with_quantities(mut self, before: i64, after: i64) -> Self {
        self.quantity_before = Some(before);
        self.quantity_after = Some(after);
        self
    }

    pub fn with_states(mut self, before: OrderState, after: OrderState) -> Self {
        self.state_before = Some(before);
        self.state_after = Some(after);
        self
    }

    /// 设置原因 (空白视为无)
    pub fn with_reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason
            .map(|r| r.trim())
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string());
        self
    }

    /// 设置详情 (转换为JSON)
    pub fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    pub fn with_affected(mut self, order_numbers: Vec<String>) -> Self {
        self.affected_order_numbers = order_numbers;
        self
    }

    /// 时间戳
    pub fn logged_at(&self) -> NaiveDateTime {
        self.log_date.and_time(self.log_time)
    }
}
