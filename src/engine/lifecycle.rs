// ==========================================
// 禽类订单结算引擎 - 订单状态机
// ==========================================
// 职责: 判定订单状态流转是否合法
// 红线: 表外流转一律拒绝, 状态不变
// 红线: 取消必须填写原因
// ==========================================
// 合法流转:
//   PENDING        → IN_PRODUCTION
//   IN_PRODUCTION  → IN_WEIGHING
//   IN_WEIGHING    → IN_DISPATCH | IN_TRANSIT | IN_PRODUCTION (回退)
//   IN_DISPATCH    → DELIVERED | COMPLETED | COMPLETED_WITH_ALERT | RETURNED | CONFIRMED_WITH_ADDITION
//   IN_TRANSIT     → 同上 | WITH_INCIDENT
//   WITH_INCIDENT  → DELIVERED | COMPLETED_WITH_ALERT | RETURNED
//   除 COMPLETED / DELIVERED / CANCELLED 外 → CANCELLED
// ==========================================

use crate::domain::types::OrderState;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("非法状态流转: {from} → {to}")]
    Illegal { from: OrderState, to: OrderState },

    #[error("取消订单必须填写原因")]
    MissingCancelReason,
}

const CLOSING_STATES: [OrderState; 5] = [
    OrderState::Delivered,
    OrderState::Completed,
    OrderState::CompletedWithAlert,
    OrderState::Returned,
    OrderState::ConfirmedWithAddition,
];

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderLifecycle;

impl OrderLifecycle {
    pub fn new() -> Self {
        Self
    }

    /// 状态表中 from 的全部合法目标
    pub fn allowed_targets(&self, from: OrderState) -> Vec<OrderState> {
        use crate::domain::types::OrderState::*;
        let mut targets = match from {
            Pending => vec![InProduction],
            InProduction => vec![InWeighing],
            InWeighing => vec![InDispatch, InTransit, InProduction],
            InDispatch => CLOSING_STATES.to_vec(),
            InTransit => {
                let mut t = CLOSING_STATES.to_vec();
                t.push(WithIncident);
                t
            }
            WithIncident => vec![Delivered, CompletedWithAlert, Returned],
            _ => Vec::new(),
        };
        if !matches!(from, Completed | Delivered | Cancelled) {
            targets.push(Cancelled);
        }
        targets
    }

    pub fn can_transition(&self, from: OrderState, to: OrderState) -> bool {
        self.allowed_targets(from).contains(&to)
    }

    /// 校验流转 (含取消原因)
    pub fn check(
        &self,
        from: OrderState,
        to: OrderState,
        reason: Option<&str>,
    ) -> Result<(), TransitionError> {
        if !self.can_transition(from, to) {
            return Err(TransitionError::Illegal { from, to });
        }
        if to == OrderState::Cancelled && reason.map_or(true, |r| r.trim().is_empty()) {
            return Err(TransitionError::MissingCancelReason);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::OrderState::*;

    #[test]
    fn test_happy_path_through_weighing() {
        let lc = OrderLifecycle::new();
        assert!(lc.check(Pending, InProduction, None).is_ok());
        assert!(lc.check(InProduction, InWeighing, None).is_ok());
        assert!(lc.check(InWeighing, InProduction, None).is_ok());
        assert!(lc.check(InWeighing, InTransit, None).is_ok());
        assert!(lc.check(InTransit, WithIncident, None).is_ok());
        assert!(lc.check(WithIncident, Returned, None).is_ok());
    }

    #[test]
    fn test_delivered_cannot_go_back_to_production() {
        let lc = OrderLifecycle::new();
        assert_eq!(
            lc.check(Delivered, InProduction, None),
            Err(TransitionError::Illegal {
                from: Delivered,
                to: InProduction
            })
        );
        assert!(!lc.can_transition(Pending, InWeighing));
        assert!(!lc.can_transition(InDispatch, WithIncident));
    }

    #[test]
    fn test_cancel_rules() {
        let lc = OrderLifecycle::new();
        assert_eq!(
            lc.check(Pending, Cancelled, Some("  ")),
            Err(TransitionError::MissingCancelReason)
        );
        assert!(lc.check(InTransit, Cancelled, Some("cliente cerrado")).is_ok());
        assert!(lc.check(Returned, Cancelled, Some("x")).is_ok());
        for closed in [Completed, Delivered, Cancelled] {
            assert!(!lc.can_transition(closed, Cancelled));
        }
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        let lc = OrderLifecycle::new();
        assert!(!lc.can_transition(Pending, Pending));
        assert!(!lc.can_transition(InTransit, InTransit));
    }
}
