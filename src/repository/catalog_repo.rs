// ==========================================
// 禽类订单结算引擎 - 基础资料数据仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 例外: 客户/禽类改名的级联更新放在同一事务内完成
// ==========================================

mod bird_type;
mod client;
mod rules;

pub use bird_type::BirdTypeRepository;
pub use client::{ClientRepository, RenameCascade};
pub use rules::{ContainerRuleRepository, PresentationRuleRepository, PriceRuleRepository};

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

/// 获取共享连接
pub(crate) fn lock_conn(
    conn: &Arc<Mutex<Connection>>,
) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}
