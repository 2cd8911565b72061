// ==========================================
// 禽类订单结算引擎 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，转换Repository/引擎错误为调用方可读的错误消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::consolidation::ConsolidationError;
use crate::engine::lifecycle::TransitionError;
use crate::engine::settlement::SettlementRuleError;
use crate::repository::error::RepositoryError;
use chrono::NaiveDate;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("合并被拒绝: {0}")]
    ConsolidationRejected(String),

    #[error("结算行已确认锁定: order_id={order_id}, date={date}")]
    LockedRow { order_id: String, date: NaiveDate },

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::ValidationError(format!("{}: {}", field, message))
            }
            RepositoryError::SerializationError(msg) => ApiError::InternalError(msg),
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(e) => ApiError::Other(e),
        }
    }
}

// ==========================================
// 从引擎错误转换
// ==========================================
impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal { from, to } => ApiError::InvalidStateTransition {
                from: from.to_string(),
                to: to.to_string(),
            },
            TransitionError::MissingCancelReason => ApiError::ValidationError(err.to_string()),
        }
    }
}

impl From<ConsolidationError> for ApiError {
    fn from(err: ConsolidationError) -> Self {
        ApiError::ConsolidationRejected(err.to_string())
    }
}

impl From<SettlementRuleError> for ApiError {
    fn from(err: SettlementRuleError) -> Self {
        match err {
            SettlementRuleError::Locked { order_id, settle_date } => ApiError::LockedRow {
                order_id,
                date: settle_date,
            },
            SettlementRuleError::NegativeValue { .. } => ApiError::ValidationError(err.to_string()),
        }
    }
}

/// API层结果类型
pub type ApiResult<T> = Result<T, ApiError>;

/// 配置读取失败 (Box<dyn Error>) → ApiError
pub(crate) fn config_error(err: Box<dyn std::error::Error>) -> ApiError {
    ApiError::InternalError(format!("配置读取失败: {}", err))
}
