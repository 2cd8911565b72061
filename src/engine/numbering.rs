// ==========================================
// 禽类订单结算引擎 - 订单编号服务
// ==========================================
// 职责: 为新订单分配 C{priority:03}.{subSeq} 编号
// 输入: 客户当日编号记录 (可能不存在) + 当日下一个空闲优先级
// 输出: NumberAssignment
// 红线: subSeq 只增不减, 合并删除订单后也不回收
// ==========================================

use crate::domain::order::{ClientSequence, Order};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

// ==========================================
// NumberAssignment - 编号结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberAssignment {
    pub priority: i32,
    pub sub_seq: i32,
    pub client_number: String,
    pub order_number: String,
    pub first_of_day: bool, // 该客户当日首单
}

impl NumberAssignment {
    /// 分配后应持久化的编号记录
    pub fn to_sequence(&self, order_date: NaiveDate, client_name: &str) -> ClientSequence {
        ClientSequence {
            order_date,
            client_name: client_name.to_string(),
            priority: self.priority,
            last_sub_seq: self.sub_seq,
        }
    }
}

// ==========================================
// OrderNumberingService - 订单编号服务
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct OrderNumberingService;

impl OrderNumberingService {
    pub fn new() -> Self {
        Self
    }

    /// 分配编号
    ///
    /// - 当日首单: priority = next_free_priority, subSeq = 1
    /// - 非首单: 沿用客户 priority, subSeq = 历史最大 + 1
    pub fn assign(
        &self,
        existing: Option<&ClientSequence>,
        next_free_priority: i32,
    ) -> NumberAssignment {
        let (priority, sub_seq, first_of_day) = match existing {
            Some(seq) => (seq.priority, seq.last_sub_seq + 1, false),
            None => (next_free_priority.max(1), 1, true),
        };

        NumberAssignment {
            priority,
            sub_seq,
            client_number: Self::format_client_number(priority),
            order_number: Self::format_order_number(priority, sub_seq),
            first_of_day,
        }
    }

    pub fn format_client_number(priority: i32) -> String {
        format!("C{:03}", priority)
    }

    pub fn format_order_number(priority: i32, sub_seq: i32) -> String {
        format!("{}.{}", Self::format_client_number(priority), sub_seq)
    }

    /// 订单号自然排序键: "C001.10" 排在 "C001.2" 之后
    ///
    /// 无法解析的编号排在最后
    pub fn order_number_key(order_number: &str) -> (i32, i32) {
        let parsed = order_number
            .trim()
            .strip_prefix('C')
            .and_then(|rest| rest.split_once('.'))
            .and_then(|(p, s)| Some((p.parse::<i32>().ok()?, s.parse::<i32>().ok()?)));
        parsed.unwrap_or((i32::MAX, i32::MAX))
    }

    /// 生产队列顺序: (priority, subSeq, 录入顺序)
    pub fn queue_order(a: &Order, b: &Order) -> Ordering {
        (a.priority, a.sub_seq, a.insertion_seq).cmp(&(b.priority, b.sub_seq, b.insertion_seq))
    }

    pub fn sort_production_queue(&self, orders: &mut [Order]) {
        orders.sort_by(Self::queue_order);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bird_type::BirdTypeLabel;
    use crate::domain::types::OrderState;
    use chrono::NaiveTime;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn order(priority: i32, sub_seq: i32, insertion_seq: i64) -> Order {
        Order {
            order_id: format!("O{}-{}-{}", priority, sub_seq, insertion_seq),
            order_number: OrderNumberingService::format_order_number(priority, sub_seq),
            client_number: OrderNumberingService::format_client_number(priority),
            priority,
            sub_seq,
            insertion_seq,
            client_name: "ElSabor".to_string(),
            bird_type: BirdTypeLabel::plain("Pollo"),
            presentation: "Vivo".to_string(),
            quantity: 10,
            container_type: "Javas".to_string(),
            order_date: date(),
            order_time: NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            state: OrderState::Pending,
            cancel_reason: None,
            weighing: None,
        }
    }

    #[test]
    fn test_first_order_of_day_takes_next_priority() {
        let service = OrderNumberingService::new();
        let a = service.assign(None, 3);
        assert_eq!(a.priority, 3);
        assert_eq!(a.sub_seq, 1);
        assert_eq!(a.order_number, "C003.1");
        assert_eq!(a.client_number, "C003");
        assert!(a.first_of_day);
    }

    #[test]
    fn test_repeat_client_continues_after_highest_issued() {
        let service = OrderNumberingService::new();
        // 已发到 .4 (中间单可能已被合并删除)
        let seq = ClientSequence {
            order_date: date(),
            client_name: "ElSabor".to_string(),
            priority: 1,
            last_sub_seq: 4,
        };
        let a = service.assign(Some(&seq), 7);
        assert_eq!(a.order_number, "C001.5");
        assert!(!a.first_of_day);
        assert_eq!(a.to_sequence(date(), "ElSabor").last_sub_seq, 5);
    }

    #[test]
    fn test_order_number_key_is_numeric() {
        let mut numbers = vec!["C001.10", "C002.1", "C001.2", "???"];
        numbers.sort_by_key(|n| OrderNumberingService::order_number_key(n));
        assert_eq!(numbers, vec!["C001.2", "C001.10", "C002.1", "???"]);
    }

    #[test]
    fn test_production_queue_ties_break_on_insertion() {
        let service = OrderNumberingService::new();
        let mut orders = vec![order(2, 1, 5), order(1, 2, 4), order(1, 1, 9), order(1, 1, 3)];
        service.sort_production_queue(&mut orders);
        let keys: Vec<_> = orders
            .iter()
            .map(|o| (o.priority, o.sub_seq, o.insertion_seq))
            .collect();
        assert_eq!(keys, vec![(1, 1, 3), (1, 1, 9), (1, 2, 4), (2, 1, 5)]);
    }
}
