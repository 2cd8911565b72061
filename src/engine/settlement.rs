// ==========================================
// 禽类订单结算引擎 - 结算计算器
// ==========================================
// 职责: 称重完成的订单 → 可计费结算行
// 步骤:
//   1. 损耗: 按 (禽类, 包装, 品种, 性别) 级联匹配单只损耗
//   2. 重量: net = max(0, base + 损耗 - 容器 - 退货 + 追加)
//            base = 复磅 > 0 ? 复磅 : 毛重
//   3. 单价: 精确 → 品种 → 该客户该禽类首条规则, 未命中单价 0 并标记
//   4. 金额: total = max(0, net) × 单价
// 红线: 引擎不访问数据库, 规则由调用方传入
// ==========================================

use crate::domain::bird_type::BirdTypeLabel;
use crate::domain::catalog::{PresentationRule, PriceRule};
use crate::domain::order::{Order, WeighingRecord};
use crate::domain::settlement::{
    SettlementEdit, SettlementOutcome, SettlementRow, SettlementWarning,
};
use crate::domain::types::{PresentationKind, Sex};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_TARE_KG: f64 = 2.5;
pub const DEFAULT_AMOUNT_DECIMALS: u32 = 2;
pub const DEFAULT_WEIGHT_DECIMALS: u32 = 3;
/// 小数位上限 (更大的值会让 round_to 溢出)
pub const MAX_DECIMALS: u32 = 6;

// ==========================================
// SettlementSettings - 计算参数
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SettlementSettings {
    pub default_tare_kg: f64,  // 容器类型未配置时的皮重
    pub amount_decimals: u32,
    pub weight_decimals: u32,
}

impl Default for SettlementSettings {
    fn default() -> Self {
        Self {
            default_tare_kg: DEFAULT_TARE_KG,
            amount_decimals: DEFAULT_AMOUNT_DECIMALS,
            weight_decimals: DEFAULT_WEIGHT_DECIMALS,
        }
    }
}

/// 规则命中级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchLevel {
    Exact,       // 品种 + 性别
    VarietyOnly, // 品种 (忽略性别)
    Fallback,    // 损耗: 通用规则; 单价: 首条规则
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceResolution {
    pub price_per_kg: f64,
    pub rule_id: Option<String>,
    pub level: Option<MatchLevel>,
}

impl PriceResolution {
    pub fn unresolved() -> Self {
        Self {
            price_per_kg: 0.0,
            rule_id: None,
            level: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.level.is_some()
    }
}

/// 生成结算行所需的基础资料 (已按客户/禽类过滤)
#[derive(Debug, Clone, Default)]
pub struct SettlementContext {
    pub presentation_rules: Vec<PresentationRule>, // 该禽类的包装规则
    pub price_rules: Vec<PriceRule>,               // 该客户+该禽类的价格规则, 录入顺序
    pub container_tare_kg: Option<f64>,            // 容器皮重, None 时用默认值
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementRuleError {
    #[error("结算行已确认, 不可修改: order_id={order_id}, date={settle_date}")]
    Locked { order_id: String, settle_date: NaiveDate },

    #[error("{field} 不能为负数: {value}")]
    NegativeValue { field: String, value: f64 },
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn same_variety(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => same_name(x, y),
        (None, None) => true,
        _ => false,
    }
}

// ==========================================
// SettlementCalculator - 结算计算器
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct SettlementCalculator {
    settings: SettlementSettings,
}

impl SettlementCalculator {
    pub fn new(settings: SettlementSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SettlementSettings {
        &self.settings
    }

    // ==========================================
    // 步骤 1: 损耗
    // ==========================================

    /// 单只损耗 (kg), 级联: 精确 → 品种 → 通用, 缺省 0
    pub fn resolve_shrink(
        &self,
        rules: &[PresentationRule],
        label: &BirdTypeLabel,
        presentation: &str,
    ) -> f64 {
        let variety = label.variety.as_deref();
        let sex = label.sex();
        let candidates: Vec<&PresentationRule> = rules
            .iter()
            .filter(|r| same_name(&r.presentation, presentation))
            .collect();

        let exact = candidates
            .iter()
            .find(|r| same_variety(r.variety.as_deref(), variety) && r.sex == sex);
        let by_variety = || {
            variety.and_then(|_| {
                Self::prefer_sexless(
                    candidates
                        .iter()
                        .copied()
                        .filter(|r| same_variety(r.variety.as_deref(), variety)),
                    |r: &PresentationRule| r.sex,
                )
            })
        };
        let generic = || {
            candidates
                .iter()
                .find(|r| r.variety.is_none() && r.sex.is_none())
                .copied()
        };

        match exact.copied().or_else(by_variety).or_else(generic) {
            Some(rule) => {
                debug!(rule_id = %rule.rule_id, shrink = rule.shrink_per_unit_kg, "损耗规则命中");
                rule.shrink_per_unit_kg
            }
            None => 0.0,
        }
    }

    // ==========================================
    // 步骤 3: 单价
    // ==========================================

    /// 单价级联: 精确 → 品种 → 首条规则 (与规则录入顺序无关的优先级)
    pub fn resolve_price(
        &self,
        rules: &[PriceRule],
        label: &BirdTypeLabel,
        presentation: &str,
    ) -> PriceResolution {
        let variety = label.variety.as_deref();
        let sex = label.sex();
        let kind = PresentationKind::classify(presentation);

        let exact = rules
            .iter()
            .find(|r| same_variety(r.variety.as_deref(), variety) && r.sex == sex)
            .map(|r| (r, MatchLevel::Exact));
        let by_variety = || {
            variety
                .and_then(|_| {
                    Self::prefer_sexless(
                        rules.iter().filter(|r| same_variety(r.variety.as_deref(), variety)),
                        |r: &PriceRule| r.sex,
                    )
                })
                .map(|r| (r, MatchLevel::VarietyOnly))
        };
        let first = || rules.first().map(|r| (r, MatchLevel::Fallback));

        match exact.or_else(by_variety).or_else(first) {
            Some((rule, level)) => PriceResolution {
                price_per_kg: rule.price_for(kind),
                rule_id: Some(rule.price_id.clone()),
                level: Some(level),
            },
            None => PriceResolution::unresolved(),
        }
    }

    fn prefer_sexless<'a, T, I>(iter: I, sex_of: fn(&T) -> Option<Sex>) -> Option<&'a T>
    where
        I: Iterator<Item = &'a T> + Clone,
    {
        iter.clone()
            .find(|r| sex_of(r).is_none())
            .or_else(|| iter.clone().next())
    }

    // ==========================================
    // 步骤 2: 重量
    // ==========================================

    /// 容器总重: 称重记录优先, 否则 皮重 × 容器数 (默认等于数量)
    pub fn container_weight(
        &self,
        weighing: &WeighingRecord,
        quantity: i64,
        tare_kg: Option<f64>,
    ) -> f64 {
        match weighing.container_weight_total_kg {
            Some(total) => total,
            None => {
                let tare = tare_kg.unwrap_or(self.settings.default_tare_kg);
                let count = weighing.containers_count.unwrap_or(quantity);
                round_to(tare * count as f64, self.settings.weight_decimals)
            }
        }
    }

    /// 生成结算行
    pub fn build_row(
        &self,
        order: &Order,
        weighing: &WeighingRecord,
        ctx: &SettlementContext,
        now: NaiveDateTime,
    ) -> SettlementOutcome {
        let shrink_per_unit =
            self.resolve_shrink(&ctx.presentation_rules, &order.bird_type, &order.presentation);
        let price = self.resolve_price(&ctx.price_rules, &order.bird_type, &order.presentation);
        if ctx.container_tare_kg.is_none() && weighing.container_weight_total_kg.is_none() {
            debug!(container_type = %order.container_type, "容器类型未配置皮重, 使用默认值");
        }

        let mut row = SettlementRow {
            settle_date: weighing.ticket_date,
            order_id: order.order_id.clone(),
            order_number: order.order_number.clone(),
            client: order.client_name.clone(),
            bird_type_label: order.bird_type.to_string(),
            presentation: order.presentation.clone(),
            quantity: order.quantity,
            shrink_total_kg: round_to(
                shrink_per_unit * order.quantity as f64,
                self.settings.weight_decimals,
            ),
            container_weight_kg: self.container_weight(
                weighing,
                order.quantity,
                ctx.container_tare_kg,
            ),
            gross_weight_kg: weighing.gross_weight_kg,
            reweigh_kg: weighing.reweigh_weight_kg,
            return_weight_kg: weighing.return_weight_kg,
            addition_kg: 0.0,
            net_weight_kg: 0.0,
            price_per_kg: price.price_per_kg,
            total_amount: 0.0,
            price_unresolved: !price.is_resolved(),
            driver: weighing.driver.clone(),
            delivery_zone: weighing.delivery_zone.clone(),
            ticket_number: Some(weighing.ticket_number.clone()),
            confirmed: false,
            updated_at: now,
        };
        self.recompute(&mut row);

        if row.price_unresolved {
            warn!(
                order_id = %order.order_id,
                client = %order.client_name,
                bird_type = %order.bird_type.base,
                "未匹配到价格规则"
            );
        }
        Self::outcome(row)
    }

    /// 重算步骤 2-4 (幂等)
    pub fn recompute(&self, row: &mut SettlementRow) {
        let base = if row.reweigh_kg > 0.0 {
            row.reweigh_kg
        } else {
            row.gross_weight_kg
        };
        let net = base + row.shrink_total_kg - row.container_weight_kg - row.return_weight_kg
            + row.addition_kg;
        row.net_weight_kg = round_to(net.max(0.0), self.settings.weight_decimals);
        row.total_amount = round_to(
            row.net_weight_kg.max(0.0) * row.price_per_kg,
            self.settings.amount_decimals,
        );
    }

    /// 人工修改字段并立即重算
    pub fn apply_edit(
        &self,
        row: &mut SettlementRow,
        edit: SettlementEdit,
        now: NaiveDateTime,
    ) -> Result<(), SettlementRuleError> {
        if row.confirmed {
            return Err(SettlementRuleError::Locked {
                order_id: row.order_id.clone(),
                settle_date: row.settle_date,
            });
        }
        let value = edit.value();
        if value < 0.0 || !value.is_finite() {
            return Err(SettlementRuleError::NegativeValue {
                field: edit.field_name().to_string(),
                value,
            });
        }

        match edit {
            SettlementEdit::Reweigh(v) => row.reweigh_kg = v,
            SettlementEdit::ShrinkTotal(v) => row.shrink_total_kg = v,
            SettlementEdit::ReturnWeight(v) => row.return_weight_kg = v,
            SettlementEdit::AdditionWeight(v) => row.addition_kg = v,
            SettlementEdit::Price(v) => {
                row.price_per_kg = v;
                row.price_unresolved = false;
            }
        }
        row.updated_at = now;
        self.recompute(row);
        Ok(())
    }

    /// 根据结算行当前状态生成告警
    pub fn outcome(row: SettlementRow) -> SettlementOutcome {
        let warnings = if row.price_unresolved {
            vec![SettlementWarning::UnresolvedPrice {
                order_id: row.order_id.clone(),
                client: row.client.clone(),
                bird_type: row.bird_type_label.clone(),
            }]
        } else {
            Vec::new()
        };
        SettlementOutcome { row, warnings }
    }
}
