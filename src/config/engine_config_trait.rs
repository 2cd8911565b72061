// ==========================================
// 禽类订单结算引擎 - 引擎配置读取 Trait
// ==========================================
// 职责: 定义结算/录入所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::engine::settlement::{
    SettlementSettings, DEFAULT_AMOUNT_DECIMALS, DEFAULT_TARE_KG, DEFAULT_WEIGHT_DECIMALS,
};
use std::error::Error;

// ==========================================
// EngineConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）, FixedEngineConfig（测试/离线）
pub trait EngineConfigReader: Send + Sync {
    /// 容器类型未配置时的默认皮重 (kg)
    ///
    /// # 默认值
    /// - 2.5
    fn get_default_tare_kg(&self) -> Result<f64, Box<dyn Error>>;

    /// 金额小数位
    ///
    /// # 默认值
    /// - 2
    fn get_amount_decimals(&self) -> Result<u32, Box<dyn Error>>;

    /// 重量小数位
    ///
    /// # 默认值
    /// - 3
    fn get_weight_decimals(&self) -> Result<u32, Box<dyn Error>>;

    /// 变更日志中缺省的操作人
    ///
    /// # 默认值
    /// - "system"
    fn get_default_actor(&self) -> Result<String, Box<dyn Error>>;

    /// 组装结算计算参数
    fn settlement_settings(&self) -> Result<SettlementSettings, Box<dyn Error>> {
        Ok(SettlementSettings {
            default_tare_kg: self.get_default_tare_kg()?,
            amount_decimals: self.get_amount_decimals()?,
            weight_decimals: self.get_weight_decimals()?,
        })
    }
}

// ==========================================
// FixedEngineConfig - 固定配置
// ==========================================
#[derive(Debug, Clone)]
pub struct FixedEngineConfig {
    pub default_tare_kg: f64,
    pub amount_decimals: u32,
    pub weight_decimals: u32,
    pub default_actor: String,
}

impl Default for FixedEngineConfig {
    fn default() -> Self {
        Self {
            default_tare_kg: DEFAULT_TARE_KG,
            amount_decimals: DEFAULT_AMOUNT_DECIMALS,
            weight_decimals: DEFAULT_WEIGHT_DECIMALS,
            default_actor: "system".to_string(),
        }
    }
}

impl EngineConfigReader for FixedEngineConfig {
    fn get_default_tare_kg(&self) -> Result<f64, Box<dyn Error>> {
        Ok(self.default_tare_kg)
    }

    fn get_amount_decimals(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.amount_decimals)
    }

    fn get_weight_decimals(&self) -> Result<u32, Box<dyn Error>> {
        Ok(self.weight_decimals)
    }

    fn get_default_actor(&self) -> Result<String, Box<dyn Error>> {
        Ok(self.default_actor.clone())
    }
}
