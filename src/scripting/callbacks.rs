//! 回调注册表
//!
//! 把外部分配的回调ID映射到脚本可调用对象。两条注册路径可以以任意顺序到达：
//! `registerViroEventCallback(id, fn)` 提供可调用对象，
//! `registerEventCallback(node, event, id)` 提供节点/事件关联。
//! 分发只按ID查找；关联仅供描述与诊断。

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const TARGET: &str = "viro_bridge::callbacks";

/// 注册表中的一个条目
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackEntry<F> {
    pub callback_id: String,
    pub node_id: Option<String>,
    pub event_name: Option<String>,
    /// 仅有关联、尚未提供可调用对象时为 `None`
    pub callable: Option<F>,
}

impl<F> CallbackEntry<F> {
    fn empty(callback_id: &str) -> Self {
        Self {
            callback_id: callback_id.to_string(),
            node_id: None,
            event_name: None,
            callable: None,
        }
    }
}

pub struct CallbackRegistry<F> {
    entries: RwLock<HashMap<String, CallbackEntry<F>>>,
}

impl<F> Default for CallbackRegistry<F> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<F: Clone> CallbackRegistry<F> {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CallbackEntry<F>>> {
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CallbackEntry<F>>> {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 一次性注册完整条目，覆盖同ID的旧条目
    pub fn register(&self, callback_id: &str, node_id: &str, event_name: &str, callable: F) {
        let replaced = self
            .write()
            .insert(
                callback_id.to_string(),
                CallbackEntry {
                    callback_id: callback_id.to_string(),
                    node_id: Some(node_id.to_string()),
                    event_name: Some(event_name.to_string()),
                    callable: Some(callable),
                },
            )
            .is_some();
        tracing::debug!(
            target: TARGET,
            "Registered callback {} for {}.{}{}",
            callback_id,
            node_id,
            event_name,
            if replaced { " (replaced)" } else { "" }
        );
    }

    /// 设置（或替换）可调用对象，保留已有关联
    pub fn attach_callable(&self, callback_id: &str, callable: F) {
        let mut entries = self.write();
        let entry = entries
            .entry(callback_id.to_string())
            .or_insert_with(|| CallbackEntry::empty(callback_id));
        let replaced = entry.callable.replace(callable).is_some();
        tracing::debug!(
            target: TARGET,
            "Attached callable to {}{}",
            callback_id,
            if replaced { " (replaced)" } else { "" }
        );
    }

    /// 记录节点/事件关联，保留已有可调用对象
    pub fn associate(&self, callback_id: &str, node_id: &str, event_name: &str) {
        let mut entries = self.write();
        let entry = entries
            .entry(callback_id.to_string())
            .or_insert_with(|| CallbackEntry::empty(callback_id));
        entry.node_id = Some(node_id.to_string());
        entry.event_name = Some(event_name.to_string());
        tracing::debug!(
            target: TARGET,
            "Associated callback {} with {}.{}",
            callback_id,
            node_id,
            event_name
        );
    }

    /// 移除回调；ID不存在时什么也不做
    ///
    /// 返回是否移除了条目。节点/事件与记录不一致时仍按ID移除。
    pub fn unregister(&self, callback_id: &str, node_id: &str, event_name: &str) -> bool {
        let removed = self.write().remove(callback_id);
        match removed {
            Some(entry) => {
                let matches = entry.node_id.as_deref().map_or(true, |n| n == node_id)
                    && entry.event_name.as_deref().map_or(true, |e| e == event_name);
                if !matches {
                    tracing::debug!(
                        target: TARGET,
                        "Callback {} was registered for {:?}.{:?}, unregistered as {}.{}",
                        callback_id,
                        entry.node_id,
                        entry.event_name,
                        node_id,
                        event_name
                    );
                }
                true
            }
            None => {
                tracing::trace!(target: TARGET, "Unregister of unknown callback {}", callback_id);
                false
            }
        }
    }

    /// 取出可调用对象的副本（不持锁调用）
    pub fn lookup(&self, callback_id: &str) -> Option<F> {
        self.read().get(callback_id).and_then(|entry| entry.callable.clone())
    }

    /// 查找并调用；ID未知或尚无可调用对象时丢弃负载并返回 `None`
    pub fn dispatch<P, R>(
        &self,
        callback_id: &str,
        payload: P,
        invoke: impl FnOnce(F, P) -> R,
    ) -> Option<R> {
        match self.lookup(callback_id) {
            Some(callable) => Some(invoke(callable, payload)),
            None => {
                tracing::trace!(target: TARGET, "Dropping event for unknown callback {}", callback_id);
                None
            }
        }
    }

    pub fn entry(&self, callback_id: &str) -> Option<CallbackEntry<F>> {
        self.read().get(callback_id).cloned()
    }

    pub fn contains(&self, callback_id: &str) -> bool {
        self.read().contains_key(callback_id)
    }

    /// 关联到某个节点的回调ID（排序）
    ///
    /// 删除节点不会级联清理回调；调用方可据此自行注销。
    pub fn ids_for_node(&self, node_id: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .read()
            .values()
            .filter(|entry| entry.node_id.as_deref() == Some(node_id))
            .map(|entry| entry.callback_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// 清空注册表，返回移除的条目数
    pub fn clear(&self) -> usize {
        let drained: Vec<CallbackEntry<F>> = self.write().drain().map(|(_, entry)| entry).collect();
        // 可调用对象在锁外释放
        let count = drained.len();
        drop(drained);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_dispatch() {
        let registry = CallbackRegistry::new();
        registry.register("cb1", "n1", "onClick", 10u32);

        assert_eq!(registry.dispatch("cb1", 5u32, |f, p| f + p), Some(15));
        assert_eq!(registry.dispatch("cb2", 5u32, |f, p| f + p), None);
    }

    #[test]
    fn test_either_registration_order() {
        let registry = CallbackRegistry::new();

        registry.attach_callable("a", 1u32);
        registry.associate("a", "n1", "onClick");

        registry.associate("b", "n2", "onHover");
        assert_eq!(registry.lookup("b"), None);
        registry.attach_callable("b", 2u32);

        for (id, node, event, value) in [("a", "n1", "onClick", 1u32), ("b", "n2", "onHover", 2)] {
            let entry = registry.entry(id).unwrap();
            assert_eq!(entry.node_id.as_deref(), Some(node));
            assert_eq!(entry.event_name.as_deref(), Some(event));
            assert_eq!(entry.callable, Some(value));
        }
    }

    #[test]
    fn test_reregister_replaces() {
        let registry = CallbackRegistry::new();
        registry.register("cb1", "n1", "onClick", 1u32);
        registry.attach_callable("cb1", 2u32);

        assert_eq!(registry.lookup("cb1"), Some(2));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_is_fail_soft() {
        let registry = CallbackRegistry::new();
        registry.register("cb1", "n1", "onClick", 1u32);

        assert!(!registry.unregister("missing", "n1", "onClick"));
        // 关联不一致仍按ID移除
        assert!(registry.unregister("cb1", "other", "onHover"));
        assert!(!registry.contains("cb1"));
        assert_eq!(registry.dispatch("cb1", (), |f, _| f), None);
    }

    #[test]
    fn test_ids_for_node_and_clear() {
        let registry = CallbackRegistry::new();
        registry.register("c2", "n1", "onClick", 0u8);
        registry.register("c1", "n1", "onHover", 0u8);
        registry.register("c3", "n2", "onClick", 0u8);

        assert_eq!(registry.ids_for_node("n1"), vec!["c1", "c2"]);
        assert_eq!(registry.clear(), 3);
        assert!(registry.is_empty());
    }
}
