// ==========================================
// 禽类订单结算引擎 - 订单合并 API
// ==========================================
// 职责: 候选分组展示、按分组确认合并、人工勾选合并
// 红线: 删除被并入订单 + 更新保留单 + 写日志 在同一事务
// 并发: 持营业日锁后重新读取订单, 再生成方案
// ==========================================

use std::sync::Arc;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{info, instrument};

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::api::keyed_lock::KeyedLocks;
use crate::api::now;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::order::Order;
use crate::domain::types::ChangeKind;
use crate::engine::consolidation::{ConsolidationEngine, ConsolidationGroup, ConsolidationPlan};
use crate::repository::order_repo::OrderRepository;

pub struct ConsolidationApi {
    order_repo: Arc<OrderRepository>,
    config: Arc<dyn EngineConfigReader>,
    engine: ConsolidationEngine,
    date_locks: Arc<KeyedLocks<NaiveDate>>,
}

impl ConsolidationApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        config: Arc<dyn EngineConfigReader>,
        date_locks: Arc<KeyedLocks<NaiveDate>>,
    ) -> Self {
        Self {
            order_repo,
            config,
            engine: ConsolidationEngine::new(),
            date_locks,
        }
    }

    /// 当日候选合并分组 (不写库)
    pub fn propose_consolidations(
        &self,
        order_date: NaiveDate,
    ) -> ApiResult<Vec<ConsolidationGroup>> {
        let orders = self.order_repo.list_by_date(order_date)?;
        Ok(self.engine.detect_groups(&orders))
    }

    /// 确认合并一个候选分组
    ///
    /// 分组按当前订单重新识别, 成员变化时拒绝
    #[instrument(skip(self))]
    pub fn apply_consolidation(&self, order_date: NaiveDate, group_id: &str) -> ApiResult<Order> {
        self.date_locks.with_key(&order_date, || {
            let orders = self.order_repo.list_by_date(order_date)?;
            let group = self
                .engine
                .detect_groups(&orders)
                .into_iter()
                .find(|g| g.group_id == group_id)
                .ok_or_else(|| {
                    ApiError::ConsolidationRejected(format!("合并分组不存在或已失效: {}", group_id))
                })?;

            let plan = self.engine.consolidate(&group, &orders)?;
            self.commit(plan, Some(group_id))
        })
    }

    /// 人工勾选合并 (全部须为同一营业日)
    #[instrument(skip(self), fields(count = order_ids.len()))]
    pub fn consolidate_manual(&self, order_ids: &[String]) -> ApiResult<Order> {
        let first = order_ids.first().ok_or_else(|| {
            ApiError::ConsolidationRejected("至少需要 2 个订单才能合并, 实际 0 个".to_string())
        })?;
        let order_date = self
            .order_repo
            .find_by_id(first)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", first)))?
            .order_date;

        self.date_locks.with_key(&order_date, || {
            let mut unique: Vec<String> = Vec::with_capacity(order_ids.len());
            for id in order_ids {
                if unique.contains(id) {
                    return Err(ApiError::ConsolidationRejected(format!(
                        "订单重复出现在合并列表中: {}",
                        id
                    )));
                }
                unique.push(id.clone());
            }

            let selected = self.order_repo.find_by_ids(&unique)?;
            if selected.len() != unique.len() {
                return Err(ApiError::NotFound(format!("部分订单不存在: {:?}", unique)));
            }
            if let Some(other) = selected.iter().find(|o| o.order_date != order_date) {
                return Err(ApiError::ConsolidationRejected(format!(
                    "合并仅限同一营业日: {} 属于 {}",
                    other.order_number, other.order_date
                )));
            }
            let plan = self.engine.consolidate_manual(&selected)?;
            self.commit(plan, None)
        })
    }

    fn commit(&self, plan: ConsolidationPlan, group_id: Option<&str>) -> ApiResult<Order> {
        let actor = self.config.get_default_actor().map_err(config_error)?;
        let removed_ids = plan.removed_ids();
        let merged: Vec<String> = plan.removed.iter().map(|o| o.order_number.clone()).collect();

        let entry = ChangeLogEntry::new(&plan.survivor.order_id, ChangeKind::Consolidation, now())
            .with_quantities(plan.quantity_before, plan.total_quantity)
            .with_affected(plan.affected_order_numbers.clone())
            .with_details(&json!({
                "actor": actor,
                "group_id": group_id,
                "survivor": plan.survivor.order_number,
                "merged": merged,
                "removed_order_ids": removed_ids,
            }));

        let removed = self
            .order_repo
            .consolidate_with_log(&plan.survivor, &removed_ids, &entry)?;
        info!(
            survivor = %plan.survivor.order_number,
            removed,
            total_quantity = plan.total_quantity,
            "订单合并完成"
        );
        Ok(plan.survivor)
    }
}
