// ==========================================
// 禽类订单结算引擎 - 订单 API
// ==========================================
// 职责: 订单录入/编号、状态流转、修改/批量修改/追加、生产队列、变更日志查询
// 红线: 每次写入与变更日志在同一事务
// 并发: 先取营业日锁, 再取订单锁 (顺序固定)
// ==========================================

use std::sync::Arc;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::api::keyed_lock::KeyedLocks;
use crate::api::now;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::change_log::ChangeLogEntry;
use crate::domain::order::{NewOrderRequest, Order, OrderEdit};
use crate::domain::types::{ChangeKind, OrderState};
use crate::engine::lifecycle::OrderLifecycle;
use crate::engine::numbering::OrderNumberingService;
use crate::engine::similarity::similar_to_request;
use crate::repository::catalog_repo::{BirdTypeRepository, ClientRepository};
use crate::repository::change_log_repo::ChangeLogRepository;
use crate::repository::order_repo::OrderRepository;

// ==========================================
// OrderApi - 订单 API
// ==========================================
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    change_log_repo: Arc<ChangeLogRepository>,
    client_repo: Arc<ClientRepository>,
    bird_type_repo: Arc<BirdTypeRepository>,
    config: Arc<dyn EngineConfigReader>,
    numbering: OrderNumberingService,
    lifecycle: OrderLifecycle,
    date_locks: Arc<KeyedLocks<NaiveDate>>,
    order_locks: Arc<KeyedLocks<String>>,
}

impl OrderApi {
    /// 创建新的OrderApi实例
    ///
    /// date_locks / order_locks 与合并、结算 API 共享
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        order_repo: Arc<OrderRepository>,
        change_log_repo: Arc<ChangeLogRepository>,
        client_repo: Arc<ClientRepository>,
        bird_type_repo: Arc<BirdTypeRepository>,
        config: Arc<dyn EngineConfigReader>,
        date_locks: Arc<KeyedLocks<NaiveDate>>,
        order_locks: Arc<KeyedLocks<String>>,
    ) -> Self {
        Self {
            order_repo,
            change_log_repo,
            client_repo,
            bird_type_repo,
            config,
            numbering: OrderNumberingService::new(),
            lifecycle: OrderLifecycle::new(),
            date_locks,
            order_locks,
        }
    }

    fn actor(&self) -> ApiResult<String> {
        self.config.get_default_actor().map_err(config_error)
    }

    fn load(&self, order_id: &str) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    /// 取营业日锁 + 订单锁后, 以最新订单数据执行 f
    fn with_order<T>(
        &self,
        order_id: &str,
        f: impl FnOnce(Order, NaiveDateTime) -> ApiResult<T>,
    ) -> ApiResult<T> {
        let order_date = self.load(order_id)?.order_date;
        self.date_locks.with_key(&order_date, || {
            self.order_locks.with_key(&order_id.to_string(), || {
                let order = self.load(order_id)?;
                f(order, now())
            })
        })
    }

    // ==========================================
    // 录入
    // ==========================================

    fn validate_request(&self, request: &NewOrderRequest) -> ApiResult<()> {
        let required = [
            ("client_name", request.client_name.as_str()),
            ("bird_type", request.bird_type.base.as_str()),
            ("presentation", request.presentation.as_str()),
            ("container_type", request.container_type.as_str()),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ApiError::ValidationError(format!("缺少必填字段: {}", field)));
            }
        }
        if request.quantity <= 0 {
            return Err(ApiError::ValidationError(format!(
                "数量必须大于 0: {}",
                request.quantity
            )));
        }

        // 只有基础资料已录入时才校验引用
        if self.client_repo.count()? > 0
            && self.client_repo.find_by_name(request.client_name.trim())?.is_none()
        {
            return Err(ApiError::ValidationError(format!(
                "未知客户: {}",
                request.client_name
            )));
        }
        if self.bird_type_repo.count()? > 0
            && self.bird_type_repo.find_by_name(request.bird_type.base.trim())?.is_none()
        {
            return Err(ApiError::ValidationError(format!(
                "未知禽类: {}",
                request.bird_type.base
            )));
        }
        Ok(())
    }

    /// 录入新订单并分配编号
    #[instrument(
        skip(self, request),
        fields(client = %request.client_name, date = %request.order_date)
    )]
    pub fn create_order(&self, request: &NewOrderRequest) -> ApiResult<Order> {
        self.validate_request(request)?;
        let client_name = request.client_name.trim().to_string();

        self.date_locks.with_key(&request.order_date, || {
            let existing = self.order_repo.find_sequence(request.order_date, &client_name)?;
            let next_free = self.order_repo.max_priority(request.order_date)? + 1;
            let assignment = self.numbering.assign(existing.as_ref(), next_free);

            let mut bird_type = request.bird_type.clone();
            bird_type.base = bird_type.base.trim().to_string();

            let order = Order {
                order_id: uuid::Uuid::new_v4().to_string(),
                order_number: assignment.order_number.clone(),
                client_number: assignment.client_number.clone(),
                priority: assignment.priority,
                sub_seq: assignment.sub_seq,
                insertion_seq: self.order_repo.next_insertion_seq()?,
                client_name: client_name.clone(),
                bird_type,
                presentation: request.presentation.trim().to_string(),
                quantity: request.quantity,
                container_type: request.container_type.trim().to_string(),
                order_date: request.order_date,
                order_time: request.order_time,
                state: OrderState::Pending,
                cancel_reason: None,
                weighing: None,
            };

            let seq = assignment.to_sequence(order.order_date, &client_name);
            self.order_repo.insert_with_sequence(&order, &seq)?;
            info!(
                order_id = %order.order_id,
                order_number = %order.order_number,
                first_of_day = assignment.first_of_day,
                "订单已录入"
            );
            Ok(order)
        })
    }

    // ==========================================
    // 状态流转
    // ==========================================

    /// 状态流转 (表外流转返回 InvalidStateTransition, 状态不变)
    #[instrument(skip(self, reason))]
    pub fn transition(
        &self,
        order_id: &str,
        to: OrderState,
        reason: Option<&str>,
    ) -> ApiResult<Order> {
        let actor = self.actor()?;
        self.with_order(order_id, |mut order, at| {
            let from = order.state;
            self.lifecycle.check(from, to, reason)?;

            let kind = if to == OrderState::Cancelled {
                ChangeKind::Cancellation
            } else {
                ChangeKind::StateChange
            };
            let entry = ChangeLogEntry::new(order_id, kind, at)
                .with_states(from, to)
                .with_reason(reason)
                .with_affected(vec![order.order_number.clone()])
                .with_details(&json!({ "actor": actor }));

            let cancel_reason = if to == OrderState::Cancelled {
                reason.map(str::trim)
            } else {
                None
            };
            self.order_repo
                .transition_with_log(order_id, from, to, cancel_reason, &entry)?;

            order.state = to;
            if let Some(r) = cancel_reason {
                order.cancel_reason = Some(r.to_string());
            }
            info!(order_number = %order.order_number, %from, %to, "订单状态已流转");
            Ok(order)
        })
    }

    /// 取消订单 (原因必填)
    pub fn cancel(&self, order_id: &str, reason: &str) -> ApiResult<Order> {
        self.transition(order_id, OrderState::Cancelled, Some(reason))
    }

    // ==========================================
    // 修改 / 批量修改 / 追加
    // ==========================================

    fn validate_edit(edit: &OrderEdit) -> ApiResult<()> {
        if edit.is_empty() {
            return Err(ApiError::ValidationError("修改内容为空".to_string()));
        }
        if let Some(q) = edit.quantity {
            if q <= 0 {
                return Err(ApiError::ValidationError(format!("数量必须大于 0: {}", q)));
            }
        }
        for (field, value) in [
            ("presentation", edit.presentation.as_deref()),
            ("container_type", edit.container_type.as_deref()),
        ] {
            if value.map_or(false, |v| v.trim().is_empty()) {
                return Err(ApiError::ValidationError(format!("{} 不能为空", field)));
            }
        }
        Ok(())
    }

    fn require_pending(order: &Order) -> ApiResult<()> {
        if order.state != OrderState::Pending {
            return Err(ApiError::ValidationError(format!(
                "只有待生产订单可以修改: {} 当前状态 {}",
                order.order_number, order.state
            )));
        }
        Ok(())
    }

    /// 修改单个待生产订单
    #[instrument(skip(self, edit, reason))]
    pub fn modify_order(
        &self,
        order_id: &str,
        edit: &OrderEdit,
        reason: Option<&str>,
    ) -> ApiResult<Order> {
        Self::validate_edit(edit)?;
        let actor = self.actor()?;

        self.with_order(order_id, |order, at| {
            Self::require_pending(&order)?;
            let mut updated = order.clone();
            edit.apply_to(&mut updated);

            let entry = ChangeLogEntry::new(order_id, ChangeKind::Modification, at)
                .with_quantities(order.quantity, updated.quantity)
                .with_reason(reason)
                .with_affected(vec![order.order_number.clone()])
                .with_details(&json!({ "actor": actor, "edit": edit }));
            self.order_repo.update_with_log(&updated, &entry)?;

            info!(order_number = %updated.order_number, "订单已修改");
            Ok(updated)
        })
    }

    /// 批量修改 (同一营业日, 全部待生产), 原子执行, 一条 MultiEdit 日志
    #[instrument(skip(self, edit, reason), fields(count = order_ids.len()))]
    pub fn multi_edit(
        &self,
        order_ids: &[String],
        edit: &OrderEdit,
        reason: Option<&str>,
    ) -> ApiResult<Vec<Order>> {
        Self::validate_edit(edit)?;
        if order_ids.is_empty() {
            return Err(ApiError::ValidationError("未选择订单".to_string()));
        }
        for (i, id) in order_ids.iter().enumerate() {
            if order_ids[..i].contains(id) {
                return Err(ApiError::ValidationError(format!("订单重复选择: {}", id)));
            }
        }
        let actor = self.actor()?;

        let order_date = self.load(&order_ids[0])?.order_date;
        self.date_locks.with_key(&order_date, || {
            let orders = self.order_repo.find_by_ids(order_ids)?;
            if orders.len() != order_ids.len() {
                let missing: Vec<&String> = order_ids
                    .iter()
                    .filter(|id| !orders.iter().any(|o| &o.order_id == *id))
                    .collect();
                return Err(ApiError::NotFound(format!("订单不存在: {:?}", missing)));
            }
            for order in &orders {
                Self::require_pending(order)?;
                if order.order_date != order_date {
                    return Err(ApiError::ValidationError(format!(
                        "批量修改仅限同一营业日: {} 属于 {}",
                        order.order_number, order.order_date
                    )));
                }
            }

            let updated: Vec<Order> = orders
                .iter()
                .map(|o| {
                    let mut u = o.clone();
                    edit.apply_to(&mut u);
                    u
                })
                .collect();

            let before: i64 = orders.iter().map(|o| o.quantity).sum();
            let after: i64 = updated.iter().map(|o| o.quantity).sum();
            let entry = ChangeLogEntry::new(&orders[0].order_id, ChangeKind::MultiEdit, now())
                .with_quantities(before, after)
                .with_reason(reason)
                .with_affected(orders.iter().map(|o| o.order_number.clone()).collect())
                .with_details(&json!({ "actor": actor, "edit": edit, "order_ids": order_ids }));
            self.order_repo.update_many_with_log(&updated, &entry)?;

            info!(count = updated.len(), "批量修改完成");
            Ok(updated)
        })
    }

    /// 追加流程: 查找可并入的已有待生产订单 (队列中第一个)
    pub fn find_similar_pending(&self, request: &NewOrderRequest) -> ApiResult<Option<Order>> {
        let mut orders = self.order_repo.list_by_state(request.order_date, OrderState::Pending)?;
        self.numbering.sort_production_queue(&mut orders);
        let found = orders.into_iter().find(|o| similar_to_request(o, request));
        debug!(found = found.is_some(), "相似待生产订单查询");
        Ok(found)
    }

    /// 追加数量到已有待生产订单
    #[instrument(skip(self, reason))]
    pub fn increase_order(
        &self,
        order_id: &str,
        delta: i64,
        reason: Option<&str>,
    ) -> ApiResult<Order> {
        if delta <= 0 {
            return Err(ApiError::ValidationError(format!("追加数量必须大于 0: {}", delta)));
        }
        let actor = self.actor()?;

        self.with_order(order_id, |order, at| {
            Self::require_pending(&order)?;
            let mut updated = order.clone();
            updated.quantity = order.quantity + delta;

            let entry = ChangeLogEntry::new(order_id, ChangeKind::Increase, at)
                .with_quantities(order.quantity, updated.quantity)
                .with_reason(reason)
                .with_affected(vec![order.order_number.clone()])
                .with_details(&json!({ "actor": actor, "delta": delta }));
            self.order_repo.update_with_log(&updated, &entry)?;

            info!(order_number = %updated.order_number, delta, "订单追加数量");
            Ok(updated)
        })
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn get_order(&self, order_id: &str) -> ApiResult<Order> {
        self.load(order_id)
    }

    /// 当日全部订单 (生产队列顺序)
    pub fn list_orders(&self, order_date: NaiveDate) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.list_by_date(order_date)?)
    }

    /// 生产队列: 待生产 + 生产中, 按 (priority, subSeq, 录入顺序)
    pub fn production_queue(&self, order_date: NaiveDate) -> ApiResult<Vec<Order>> {
        let mut queue: Vec<Order> = self
            .order_repo
            .list_by_date(order_date)?
            .into_iter()
            .filter(|o| o.state.is_queued())
            .collect();
        self.numbering.sort_production_queue(&mut queue);
        Ok(queue)
    }

    // ===== 变更日志 =====

    pub fn change_log_for_order(&self, order_id: &str) -> ApiResult<Vec<ChangeLogEntry>> {
        Ok(self.change_log_repo.find_by_order(order_id)?)
    }

    pub fn change_log_for_date(&self, date: NaiveDate) -> ApiResult<Vec<ChangeLogEntry>> {
        Ok(self.change_log_repo.find_by_date(date)?)
    }

    pub fn change_log_by_kind(&self, kind: ChangeKind) -> ApiResult<Vec<ChangeLogEntry>> {
        Ok(self.change_log_repo.find_by_kind(kind)?)
    }

    pub fn change_log_all(&self) -> ApiResult<Vec<ChangeLogEntry>> {
        Ok(self.change_log_repo.list_all()?)
    }
}
