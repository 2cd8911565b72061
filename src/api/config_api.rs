// ==========================================
// 禽类订单结算引擎 - 配置管理 API
// ==========================================
// 职责: 配置查询、更新、快照
// 约束: 已知配置键在写入前做类型校验
// ==========================================

use std::sync::Arc;
use tracing::info;

use crate::api::error::{config_error, ApiError, ApiResult};
use crate::config::config_manager::{config_keys, ConfigManager};
use crate::engine::settlement::MAX_DECIMALS;

/// 配置管理API
pub struct ConfigApi {
    config_manager: Arc<ConfigManager>,
}

impl ConfigApi {
    pub fn new(config_manager: Arc<ConfigManager>) -> Self {
        Self { config_manager }
    }

    /// 查询单个配置 (global 作用域)
    pub fn get_config(&self, key: &str) -> ApiResult<Option<String>> {
        self.config_manager
            .get_global_config_value(key)
            .map_err(config_error)
    }

    /// 更新单个配置
    pub fn update_config(&self, key: &str, value: &str) -> ApiResult<()> {
        Self::validate(key, value)?;
        self.config_manager
            .set_global_config_value(key, value.trim())
            .map_err(config_error)?;
        info!(key, value, "配置已更新");
        Ok(())
    }

    /// 全部配置快照 (JSON)
    pub fn get_config_snapshot(&self) -> ApiResult<String> {
        self.config_manager.get_config_snapshot().map_err(config_error)
    }

    fn validate(key: &str, value: &str) -> ApiResult<()> {
        let value = value.trim();
        let invalid = |expect: &str| {
            ApiError::ValidationError(format!("配置 {} 需要{}: {}", key, expect, value))
        };
        match key {
            config_keys::DEFAULT_TARE_KG => match value.parse::<f64>() {
                Ok(v) if v >= 0.0 && v.is_finite() => Ok(()),
                _ => Err(invalid("非负数值")),
            },
            config_keys::AMOUNT_DECIMALS | config_keys::WEIGHT_DECIMALS => {
                match value.parse::<u32>() {
                    Ok(v) if v <= MAX_DECIMALS => Ok(()),
                    _ => Err(invalid("0-6 的整数")),
                }
            }
            config_keys::DEFAULT_ACTOR if value.is_empty() => Err(invalid("非空值")),
            _ => Ok(()),
        }
    }
}
