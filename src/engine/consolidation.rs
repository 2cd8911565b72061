// ==========================================
// 禽类订单结算引擎 - 订单合并引擎
// ==========================================
// 职责: 识别可合并的待生产订单, 生成合并方案
// 输入: 当日订单列表
// 输出: ConsolidationGroup (候选) / ConsolidationPlan (执行方案)
// 红线: 引擎只产出方案, 不直接写库
// 红线: 合并不改变客户 priority / client_number
// ==========================================

use crate::domain::bird_type::SexCounts;
use crate::domain::order::Order;
use crate::domain::types::OrderState;
use crate::engine::numbering::OrderNumberingService;
use crate::engine::similarity::{similar, SimilarityKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

// ==========================================
// ConsolidationError - 合并被拒绝的原因
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsolidationError {
    #[error("至少需要 2 个订单才能合并, 实际 {count} 个")]
    TooFewOrders { count: usize },

    #[error("订单 {order_number} 不是待生产状态 ({state})")]
    NotPending { order_number: String, state: OrderState },

    #[error("订单 {first} 与 {second} 不满足合并条件")]
    NotSimilar { first: String, second: String },

    #[error("订单重复出现在合并列表中: {order_id}")]
    DuplicateOrder { order_id: String },

    #[error("合并分组已失效: {group_id}")]
    StaleGroup { group_id: String },
}

// ==========================================
// ConsolidationGroup - 合并候选分组
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationGroup {
    pub group_id: String,
    pub key: SimilarityKey,
    pub order_ids: Vec<String>,     // 生产队列顺序
    pub order_numbers: Vec<String>,
    pub total_quantity: i64,
}

// ==========================================
// ConsolidationPlan - 合并执行方案
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidationPlan {
    pub survivor: Order,           // 已更新数量/公母的保留单
    pub removed: Vec<Order>,       // 被并入并删除的订单
    pub quantity_before: i64,      // 保留单合并前数量
    pub total_quantity: i64,
    pub affected_order_numbers: Vec<String>,
}

impl ConsolidationPlan {
    pub fn removed_ids(&self) -> Vec<String> {
        self.removed.iter().map(|o| o.order_id.clone()).collect()
    }
}

// ==========================================
// ConsolidationEngine - 订单合并引擎
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ConsolidationEngine {
    numbering: OrderNumberingService,
}

impl ConsolidationEngine {
    pub fn new() -> Self {
        Self {
            numbering: OrderNumberingService::new(),
        }
    }

    /// 识别候选分组
    ///
    /// 只看 Pending 订单; 成员数 ≥ 2 的分组才输出
    /// 分组按首个成员在生产队列中的位置排序
    #[instrument(skip(self, orders), fields(count = orders.len()))]
    pub fn detect_groups(&self, orders: &[Order]) -> Vec<ConsolidationGroup> {
        let mut pending: Vec<Order> = orders
            .iter()
            .filter(|o| o.state == OrderState::Pending)
            .cloned()
            .collect();
        self.numbering.sort_production_queue(&mut pending);

        let mut buckets: Vec<(SimilarityKey, Vec<&Order>)> = Vec::new();
        for order in &pending {
            let key = SimilarityKey::from_order(order);
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(order),
                None => buckets.push((key, vec![order])),
            }
        }

        let groups: Vec<ConsolidationGroup> = buckets
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(key, members)| ConsolidationGroup {
                group_id: key.to_string(),
                order_ids: members.iter().map(|o| o.order_id.clone()).collect(),
                order_numbers: members.iter().map(|o| o.order_number.clone()).collect(),
                total_quantity: members.iter().map(|o| o.quantity).sum(),
                key,
            })
            .collect();

        debug!(groups = groups.len(), "合并候选识别完成");
        groups
    }

    /// 按分组生成合并方案
    ///
    /// 分组须与当前订单状态一致, 否则视为失效
    pub fn consolidate(
        &self,
        group: &ConsolidationGroup,
        orders: &[Order],
    ) -> Result<ConsolidationPlan, ConsolidationError> {
        let current = self
            .detect_groups(orders)
            .into_iter()
            .find(|g| g.group_id == group.group_id);

        match current {
            Some(g) if g.order_ids == group.order_ids => {
                let members: Vec<Order> = g
                    .order_ids
                    .iter()
                    .filter_map(|id| orders.iter().find(|o| &o.order_id == id).cloned())
                    .collect();
                self.consolidate_manual(&members)
            }
            _ => Err(ConsolidationError::StaleGroup {
                group_id: group.group_id.clone(),
            }),
        }
    }

    /// 人工勾选合并
    ///
    /// 少于 2 单或任意两单不相似时拒绝; 保留单为队列中最靠前的订单
    pub fn consolidate_manual(
        &self,
        selected: &[Order],
    ) -> Result<ConsolidationPlan, ConsolidationError> {
        if selected.len() < 2 {
            return Err(ConsolidationError::TooFewOrders {
                count: selected.len(),
            });
        }

        for (i, order) in selected.iter().enumerate() {
            if order.state != OrderState::Pending {
                return Err(ConsolidationError::NotPending {
                    order_number: order.order_number.clone(),
                    state: order.state,
                });
            }
            if selected[..i].iter().any(|o| o.order_id == order.order_id) {
                return Err(ConsolidationError::DuplicateOrder {
                    order_id: order.order_id.clone(),
                });
            }
        }

        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                if !similar(a, b) {
                    return Err(ConsolidationError::NotSimilar {
                        first: a.order_number.clone(),
                        second: b.order_number.clone(),
                    });
                }
            }
        }

        let mut members = selected.to_vec();
        self.numbering.sort_production_queue(&mut members);

        let total_quantity: i64 = members.iter().map(|o| o.quantity).sum();
        let affected_order_numbers = members.iter().map(|o| o.order_number.clone()).collect();

        // 全部成员都带公母数量时求和, 否则清空
        let sex_counts = members
            .iter()
            .map(|o| o.bird_type.sex_counts)
            .try_fold(SexCounts::default(), |acc, c| c.map(|c| acc.add(&c)));

        let mut iter = members.into_iter();
        let mut survivor = match iter.next() {
            Some(first) => first,
            None => return Err(ConsolidationError::TooFewOrders { count: 0 }),
        };
        let quantity_before = survivor.quantity;
        survivor.quantity = total_quantity;
        survivor.bird_type.sex_counts = sex_counts;

        Ok(ConsolidationPlan {
            survivor,
            removed: iter.collect(),
            quantity_before,
            total_quantity,
            affected_order_numbers,
        })
    }
}
