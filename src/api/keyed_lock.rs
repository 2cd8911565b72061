// ==========================================
// 禽类订单结算引擎 - 按键串行锁
// ==========================================
// 用途: 同一营业日的编号/结算写入串行, 同一订单的状态流转串行
// 约束: 仓储内部只锁共享连接, 不会反向获取此处的键锁
// 回收: 最后一个持有者释放后移除该键, 表大小只随并发中的键数变化
// ==========================================

use crate::api::error::ApiResult;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// 每个键一把互斥锁, 按需创建, 用完即回收
pub struct KeyedLocks<K: Eq + Hash> {
    slots: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取出 key 的锁槽, 与 release 共用同一分片锁
    fn slot(&self, key: &K) -> Arc<Mutex<()>> {
        self.slots.entry(key.clone()).or_default().clone()
    }

    /// 只剩表内引用时移除
    fn release(&self, key: &K, slot: Arc<Mutex<()>>) {
        drop(slot);
        self.slots.remove_if(key, |_, s| Arc::strong_count(s) == 1);
    }

    /// 持有 key 的锁执行 f
    pub fn with_key<T>(&self, key: &K, f: impl FnOnce() -> ApiResult<T>) -> ApiResult<T> {
        let slot = self.slot(key);
        let result = {
            // 中毒只说明持锁方 panic, 锁本身仍然可用
            let _guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };
        self.release(key, slot);
        result
    }

    /// 当前登记的键数量
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
