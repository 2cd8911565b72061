// ==========================================
// 禽类订单结算引擎 - 结算 API
// ==========================================
// 职责: 称重数据接入、当日结算行生成/编辑/确认、导出
// 红线: 已确认结算行不可修改, 只能显式退回编辑
// 并发: 按营业日串行 (与订单写入共享日期锁)
// ==========================================

use std::cmp::Ordering;
use std::sync::Arc;
use chrono::NaiveDate;
use tracing::{debug, info, instrument, warn};

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::api::keyed_lock::KeyedLocks;
use crate::api::now;
use crate::config::engine_config_trait::EngineConfigReader;
use crate::domain::order::{Order, WeighingFeed, WeighingRecord};
use crate::domain::settlement::{
    ExportFilter, ExportRow, ExportSort, SettlementEdit, SettlementOutcome, SettlementRow,
};
use crate::engine::numbering::OrderNumberingService;
use crate::engine::settlement::{SettlementCalculator, SettlementContext};
use crate::repository::catalog_repo::{
    BirdTypeRepository, ClientRepository, ContainerRuleRepository, PresentationRuleRepository,
    PriceRuleRepository,
};
use crate::repository::order_repo::OrderRepository;
use crate::repository::settlement_repo::SettlementRowRepository;

// ==========================================
// SettlementApi - 结算 API
// ==========================================
pub struct SettlementApi {
    settlement_repo: Arc<SettlementRowRepository>,
    order_repo: Arc<OrderRepository>,
    client_repo: Arc<ClientRepository>,
    bird_type_repo: Arc<BirdTypeRepository>,
    presentation_repo: Arc<PresentationRuleRepository>,
    container_repo: Arc<ContainerRuleRepository>,
    price_repo: Arc<PriceRuleRepository>,
    config: Arc<dyn EngineConfigReader>,
    date_locks: Arc<KeyedLocks<NaiveDate>>,
    order_locks: Arc<KeyedLocks<String>>,
}

impl SettlementApi {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settlement_repo: Arc<SettlementRowRepository>,
        order_repo: Arc<OrderRepository>,
        client_repo: Arc<ClientRepository>,
        bird_type_repo: Arc<BirdTypeRepository>,
        presentation_repo: Arc<PresentationRuleRepository>,
        container_repo: Arc<ContainerRuleRepository>,
        price_repo: Arc<PriceRuleRepository>,
        config: Arc<dyn EngineConfigReader>,
        date_locks: Arc<KeyedLocks<NaiveDate>>,
        order_locks: Arc<KeyedLocks<String>>,
    ) -> Self {
        Self {
            settlement_repo,
            order_repo,
            client_repo,
            bird_type_repo,
            presentation_repo,
            container_repo,
            price_repo,
            config,
            date_locks,
            order_locks,
        }
    }

    /// 按当前配置构造计算器 (配置可在运行期修改)
    fn calculator(&self) -> ApiResult<SettlementCalculator> {
        let settings = self.config.settlement_settings().map_err(config_error)?;
        Ok(SettlementCalculator::new(settings))
    }

    /// 收集订单对应的损耗/价格/皮重规则
    fn context_for(&self, order: &Order) -> ApiResult<SettlementContext> {
        let bird_type = self.bird_type_repo.find_by_name(&order.bird_type.base)?;
        let client = self.client_repo.find_by_name(&order.client_name)?;

        let presentation_rules = match &bird_type {
            Some(bt) => self.presentation_repo.list_for_bird_type(&bt.bird_type_id)?,
            None => Vec::new(),
        };
        let price_rules = match (&client, &bird_type) {
            (Some(c), Some(bt)) => self.price_repo.list_for(&c.client_id, &bt.bird_type_id)?,
            _ => Vec::new(),
        };
        let container_tare_kg = self
            .container_repo
            .find_by_type(&order.container_type)?
            .map(|c| c.tare_kg);

        Ok(SettlementContext {
            presentation_rules,
            price_rules,
            container_tare_kg,
        })
    }

    fn load_row(&self, settle_date: NaiveDate, order_id: &str) -> ApiResult<SettlementRow> {
        self.settlement_repo.find(settle_date, order_id)?.ok_or_else(|| {
            ApiError::NotFound(format!("结算行(date={}, order_id={})不存在", settle_date, order_id))
        })
    }

    /// 生成或刷新结算行 (已确认的不动)
    fn build_or_refresh(
        &self,
        calculator: &SettlementCalculator,
        order: &Order,
        weighing: &WeighingRecord,
    ) -> ApiResult<SettlementOutcome> {
        if let Some(existing) = self.settlement_repo.find(weighing.ticket_date, &order.order_id)? {
            if existing.confirmed {
                debug!(order_id = %order.order_id, "结算行已确认, 跳过刷新");
                return Ok(SettlementCalculator::outcome(existing));
            }
            let ctx = self.context_for(order)?;
            let mut outcome = calculator.build_row(order, weighing, &ctx, now());
            // 追加重量只来自人工录入
            outcome.row.addition_kg = existing.addition_kg;
            calculator.recompute(&mut outcome.row);
            self.settlement_repo.upsert(&outcome.row)?;
            return Ok(outcome);
        }

        let ctx = self.context_for(order)?;
        let outcome = calculator.build_row(order, weighing, &ctx, now());
        self.settlement_repo.upsert(&outcome.row)?;
        Ok(outcome)
    }

    // ==========================================
    // 称重接入
    // ==========================================

    /// 接入一条称重数据
    ///
    /// 出磅日期等于 viewed_date 时生成/刷新当日结算行并返回; 否则只保存称重结果
    /// 订单须已进入称重且未取消
    #[instrument(
        skip(self, feed),
        fields(order_id = %feed.order_id, ticket_date = %feed.ticket_date)
    )]
    pub fn apply_weighing(
        &self,
        feed: &WeighingFeed,
        viewed_date: NaiveDate,
    ) -> ApiResult<Option<SettlementOutcome>> {
        Self::validate_feed(feed)?;
        let record = feed.to_record();
        let calculator = self.calculator()?;

        self.date_locks.with_key(&record.ticket_date, || {
            self.order_locks.with_key(&feed.order_id, || {
                let order = self.load_order(&feed.order_id)?;
                if !order.state.accepts_weighing() {
                    return Err(ApiError::ValidationError(format!(
                        "订单 {} 状态为 {}, 不能接收称重",
                        order.order_number, order.state
                    )));
                }

                self.order_repo.record_weighing(&feed.order_id, &record)?;
                info!(ticket_number = %record.ticket_number, "称重结果已保存");

                if record.ticket_date != viewed_date {
                    return Ok(None);
                }
                let order = self.load_order(&feed.order_id)?;
                self.build_or_refresh(&calculator, &order, &record).map(Some)
            })
        })
    }

    fn load_order(&self, order_id: &str) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("订单(id={})不存在", order_id)))
    }

    fn validate_feed(feed: &WeighingFeed) -> ApiResult<()> {
        if feed.order_id.trim().is_empty() {
            return Err(ApiError::ValidationError("缺少必填字段: order_id".to_string()));
        }
        if feed.ticket_number.trim().is_empty() {
            return Err(ApiError::ValidationError("缺少必填字段: ticket_number".to_string()));
        }
        let weights = [
            ("gross_weight_kg", Some(feed.gross_weight_kg)),
            ("container_weight_total_kg", feed.container_weight_total_kg),
            ("reweigh_weight_kg", feed.reweigh_weight_kg),
            ("return_weight_kg", feed.return_weight_kg),
        ];
        for (field, value) in weights {
            if let Some(v) = value {
                if v < 0.0 || !v.is_finite() {
                    return Err(ApiError::ValidationError(format!("{} 不能为负数: {}", field, v)));
                }
            }
        }
        if let Some(count) = feed.containers_count {
            if count < 0 {
                return Err(ApiError::ValidationError(format!(
                    "containers_count 不能为负数: {}",
                    count
                )));
            }
        }
        Ok(())
    }

    /// 为当日已出磅但尚无结算行的订单补建结算行
    #[instrument(skip(self))]
    pub fn sync_day(&self, settle_date: NaiveDate) -> ApiResult<Vec<SettlementOutcome>> {
        let calculator = self.calculator()?;
        self.date_locks.with_key(&settle_date, || {
            let existing = self.settlement_repo.load_day(settle_date)?;
            let mut created = Vec::new();
            for order in self.order_repo.list_ticketed_on(settle_date)? {
                // 称重后取消的订单不再开票
                if !order.state.accepts_weighing()
                    || existing.iter().any(|r| r.order_id == order.order_id)
                {
                    continue;
                }
                let Some(weighing) = order.weighing.clone() else {
                    continue;
                };
                let ctx = self.context_for(&order)?;
                let outcome = calculator.build_row(&order, &weighing, &ctx, now());
                self.settlement_repo.upsert(&outcome.row)?;
                created.push(outcome);
            }
            if !created.is_empty() {
                info!(created = created.len(), "当日结算行已补建");
            }
            Ok(created)
        })
    }

    // ==========================================
    // 当日结算视图
    // ==========================================

    pub fn load_day(&self, settle_date: NaiveDate) -> ApiResult<Vec<SettlementRow>> {
        Ok(self.settlement_repo.load_day(settle_date)?)
    }

    /// 整日替换结算行 (原子)
    ///
    /// 已确认行必须原样保留, 否则返回 LockedRow; 确认只能走 confirm.
    /// 未确认行按当前配置重算净重和金额后写入
    pub fn save_day(&self, settle_date: NaiveDate, rows: &[SettlementRow]) -> ApiResult<usize> {
        let foreign = rows.iter().filter(|r| r.settle_date != settle_date).count();
        if foreign > 0 {
            warn!(%settle_date, foreign, "非当日结算行已忽略");
        }
        let calculator = self.calculator()?;

        self.date_locks.with_key(&settle_date, || {
            let stored = self.settlement_repo.load_day(settle_date)?;
            let incoming: Vec<&SettlementRow> =
                rows.iter().filter(|r| r.settle_date == settle_date).collect();
            for (i, row) in incoming.iter().enumerate() {
                if incoming[..i].iter().any(|r| r.order_id == row.order_id) {
                    return Err(ApiError::ValidationError(format!(
                        "结算行重复: order_id={}",
                        row.order_id
                    )));
                }
            }

            for locked in stored.iter().filter(|r| r.confirmed) {
                let kept = incoming.iter().any(|r| *r == locked);
                if !kept {
                    return Err(ApiError::LockedRow {
                        order_id: locked.order_id.clone(),
                        date: settle_date,
                    });
                }
            }

            let mut prepared = Vec::with_capacity(incoming.len());
            for row in incoming {
                if row.confirmed {
                    let was_locked = stored
                        .iter()
                        .any(|s| s.confirmed && s.order_id == row.order_id);
                    if !was_locked {
                        return Err(ApiError::ValidationError(format!(
                            "结算行 {} 未确认, 不能通过整日保存确认",
                            row.order_number
                        )));
                    }
                    prepared.push(row.clone());
                    continue;
                }
                let mut row = row.clone();
                calculator.recompute(&mut row);
                row.updated_at = now();
                prepared.push(row);
            }

            let saved = self.settlement_repo.save_day(settle_date, &prepared)?;
            info!(%settle_date, saved, "当日结算行已保存");
            Ok(saved)
        })
    }

    /// 人工修改字段并立即重算
    #[instrument(skip(self))]
    pub fn edit_field(
        &self,
        settle_date: NaiveDate,
        order_id: &str,
        edit: SettlementEdit,
    ) -> ApiResult<SettlementOutcome> {
        let calculator = self.calculator()?;
        self.date_locks.with_key(&settle_date, || {
            let mut row = self.load_row(settle_date, order_id)?;
            calculator.apply_edit(&mut row, edit, now())?;
            self.settlement_repo.upsert(&row)?;
            debug!(field = edit.field_name(), value = edit.value(), "结算行已修改");
            Ok(SettlementCalculator::outcome(row))
        })
    }

    /// 确认结算行 (幂等)
    pub fn confirm(&self, settle_date: NaiveDate, order_id: &str) -> ApiResult<SettlementRow> {
        self.set_confirmed(settle_date, order_id, true)
    }

    /// 退回编辑
    pub fn reopen(&self, settle_date: NaiveDate, order_id: &str) -> ApiResult<SettlementRow> {
        self.set_confirmed(settle_date, order_id, false)
    }

    fn set_confirmed(
        &self,
        settle_date: NaiveDate,
        order_id: &str,
        confirmed: bool,
    ) -> ApiResult<SettlementRow> {
        self.date_locks.with_key(&settle_date, || {
            let mut row = self.load_row(settle_date, order_id)?;
            if row.confirmed == confirmed {
                return Ok(row);
            }
            row.confirmed = confirmed;
            row.updated_at = now();
            self.settlement_repo.upsert(&row)?;
            info!(%order_id, confirmed, "结算行确认状态已变更");
            Ok(row)
        })
    }

    // ==========================================
    // 导出
    // ==========================================

    /// 导出当日结算平表 (只筛选/排序, 不计算)
    pub fn export_day(
        &self,
        settle_date: NaiveDate,
        filter: &ExportFilter,
        sort: ExportSort,
    ) -> ApiResult<Vec<ExportRow>> {
        let mut rows: Vec<SettlementRow> = self
            .settlement_repo
            .load_day(settle_date)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();

        let by_number = |a: &SettlementRow, b: &SettlementRow| {
            OrderNumberingService::order_number_key(&a.order_number)
                .cmp(&OrderNumberingService::order_number_key(&b.order_number))
        };
        match sort {
            ExportSort::OrderNumber => rows.sort_by(by_number),
            ExportSort::Client => {
                rows.sort_by(|a, b| a.client.cmp(&b.client).then_with(|| by_number(a, b)))
            }
            ExportSort::TotalDesc => rows.sort_by(|a, b| {
                b.total_amount
                    .partial_cmp(&a.total_amount)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| by_number(a, b))
            }),
            // 无配送区域的排在最后
            ExportSort::DeliveryZone => rows.sort_by(|a, b| {
                let zone = match (&a.delivery_zone, &b.delivery_zone) {
                    (Some(x), Some(y)) => x.cmp(y),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => Ordering::Equal,
                };
                zone.then_with(|| by_number(a, b))
            }),
        }

        Ok(rows.iter().map(ExportRow::from).collect())
    }
}
