// ==========================================
// 禽类订单结算引擎 - 相似订单判定
// ==========================================
// 纯函数: similar(a, b)
// 条件: 双方均为 Pending, 客户/归一化禽类/包装规格/容器类型一致
// 性质: 对称; 仅 Pending 订单自反
// ==========================================

use crate::domain::order::{NewOrderRequest, Order};
use crate::domain::types::OrderState;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SimilarityKey - 合并分组键
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimilarityKey {
    pub client: String,
    pub bird_base: String,
    pub presentation: String,
    pub container_type: String,
}

impl SimilarityKey {
    pub fn from_order(order: &Order) -> Self {
        Self {
            client: order.client_name.clone(),
            bird_base: order.bird_type.normalized().to_string(),
            presentation: order.presentation.clone(),
            container_type: order.container_type.clone(),
        }
    }

    pub fn from_request(request: &NewOrderRequest) -> Self {
        Self {
            client: request.client_name.trim().to_string(),
            bird_base: request.bird_type.normalized().to_string(),
            presentation: request.presentation.trim().to_string(),
            container_type: request.container_type.trim().to_string(),
        }
    }
}

/// 分组 ID 即键的字符串形式
impl fmt::Display for SimilarityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.client, self.bird_base, self.presentation, self.container_type
        )
    }
}

pub fn similar(a: &Order, b: &Order) -> bool {
    a.state == OrderState::Pending
        && b.state == OrderState::Pending
        && SimilarityKey::from_order(a) == SimilarityKey::from_order(b)
}

/// 追加流程: 待录入请求是否可以并入已有待生产订单
pub fn similar_to_request(order: &Order, request: &NewOrderRequest) -> bool {
    order.state == OrderState::Pending
        && order.order_date == request.order_date
        && SimilarityKey::from_order(order) == SimilarityKey::from_request(request)
}
