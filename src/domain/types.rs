// ==========================================
// 禽类订单结算引擎 - 领域类型定义
// ==========================================
// 订单状态 / 变更类型 / 品相分类 / 性别
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单状态 (Order State)
// ==========================================
// 初始状态: Pending
// 合法转换见 engine::lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Pending,               // 待处理
    InProduction,          // 生产中
    InWeighing,            // 称重中
    InDispatch,            // 待发货
    InTransit,             // 运输中
    WithIncident,          // 异常
    Delivered,             // 已送达
    Completed,             // 已完成
    CompletedWithAlert,    // 完成(带警告)
    Returned,              // 已退回
    ConfirmedWithAddition, // 确认(带追加)
    Cancelled,             // 已取消
}

impl OrderState {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "PENDING",
            OrderState::InProduction => "IN_PRODUCTION",
            OrderState::InWeighing => "IN_WEIGHING",
            OrderState::InDispatch => "IN_DISPATCH",
            OrderState::InTransit => "IN_TRANSIT",
            OrderState::WithIncident => "WITH_INCIDENT",
            OrderState::Delivered => "DELIVERED",
            OrderState::Completed => "COMPLETED",
            OrderState::CompletedWithAlert => "COMPLETED_WITH_ALERT",
            OrderState::Returned => "RETURNED",
            OrderState::ConfirmedWithAddition => "CONFIRMED_WITH_ADDITION",
            OrderState::Cancelled => "CANCELLED",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderState::Pending),
            "IN_PRODUCTION" => Some(OrderState::InProduction),
            "IN_WEIGHING" => Some(OrderState::InWeighing),
            "IN_DISPATCH" => Some(OrderState::InDispatch),
            "IN_TRANSIT" => Some(OrderState::InTransit),
            "WITH_INCIDENT" => Some(OrderState::WithIncident),
            "DELIVERED" => Some(OrderState::Delivered),
            "COMPLETED" => Some(OrderState::Completed),
            "COMPLETED_WITH_ALERT" => Some(OrderState::CompletedWithAlert),
            "RETURNED" => Some(OrderState::Returned),
            "CONFIRMED_WITH_ADDITION" => Some(OrderState::ConfirmedWithAddition),
            "CANCELLED" => Some(OrderState::Cancelled),
            _ => None,
        }
    }

    /// 是否仍在生产队列中
    pub fn is_queued(&self) -> bool {
        matches!(self, OrderState::Pending | OrderState::InProduction)
    }

    /// 是否可以接收称重结果 (已进入称重且未取消)
    pub fn accepts_weighing(&self) -> bool {
        !matches!(
            self,
            OrderState::Pending | OrderState::InProduction | OrderState::Cancelled
        )
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 变更日志类型 (Change Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Cancellation,  // 取消
    Modification,  // 修改
    Increase,      // 追加数量
    Consolidation, // 合并
    MultiEdit,     // 批量修改
    StateChange,   // 状态流转
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Cancellation => "CANCELLATION",
            ChangeKind::Modification => "MODIFICATION",
            ChangeKind::Increase => "INCREASE",
            ChangeKind::Consolidation => "CONSOLIDATION",
            ChangeKind::MultiEdit => "MULTI_EDIT",
            ChangeKind::StateChange => "STATE_CHANGE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CANCELLATION" => Some(ChangeKind::Cancellation),
            "MODIFICATION" => Some(ChangeKind::Modification),
            "INCREASE" => Some(ChangeKind::Increase),
            "CONSOLIDATION" => Some(ChangeKind::Consolidation),
            "MULTI_EDIT" => Some(ChangeKind::MultiEdit),
            "STATE_CHANGE" => Some(ChangeKind::StateChange),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// 品相分类 (Presentation Kind)
// ==========================================
// 品相名称为自由文本, 价格字段按分类选取
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresentationKind {
    Alive,       // 活禽 (按笼计)
    Plucked,     // 脱毛
    Eviscerated, // 去内脏
    Other,
}

impl PresentationKind {
    /// 按名称识别品相 (忽略大小写与首尾空白)
    pub fn classify(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "vivo" | "alive" => PresentationKind::Alive,
            "pelado" | "plucked" => PresentationKind::Plucked,
            "eviscerado" | "eviscerated" => PresentationKind::Eviscerated,
            _ => PresentationKind::Other,
        }
    }
}

// ==========================================
// 性别 (Sex)
// ==========================================
// M = 公, H = 母
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sex {
    M,
    H,
}

impl Sex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::M => "M",
            Sex::H => "H",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "M" => Some(Sex::M),
            "H" => Some(Sex::H),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_state_roundtrip_strings() {
        for state in [
            OrderState::Pending,
            OrderState::InWeighing,
            OrderState::WithIncident,
            OrderState::ConfirmedWithAddition,
            OrderState::Cancelled,
        ] {
            assert_eq!(OrderState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OrderState::parse("UNKNOWN"), None);
    }

    #[test]
    fn test_weighing_accepted_from_in_weighing_on() {
        assert!(!OrderState::Pending.accepts_weighing());
        assert!(!OrderState::InProduction.accepts_weighing());
        assert!(!OrderState::Cancelled.accepts_weighing());
        assert!(OrderState::InWeighing.accepts_weighing());
        assert!(OrderState::InTransit.accepts_weighing());
        assert!(OrderState::Returned.accepts_weighing());
    }

    #[test]
    fn test_presentation_classify() {
        assert_eq!(PresentationKind::classify("Vivo"), PresentationKind::Alive);
        assert_eq!(PresentationKind::classify(" alive "), PresentationKind::Alive);
        assert_eq!(PresentationKind::classify("PELADO"), PresentationKind::Plucked);
        assert_eq!(PresentationKind::classify("Eviscerated"), PresentationKind::Eviscerated);
        assert_eq!(PresentationKind::classify("Trozado"), PresentationKind::Other);
    }

    #[test]
    fn test_sex_parse() {
        assert_eq!(Sex::parse("m"), Some(Sex::M));
        assert_eq!(Sex::parse("H"), Some(Sex::H));
        assert_eq!(Sex::parse("X"), None);
    }
}
