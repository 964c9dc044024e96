//! 节点注册表
//!
//! 从稳定的字符串ID到原生场景节点的权威映射，提供创建、更新、删除和
//! 重新挂接操作。所有变更在写锁内完成，查询走读锁。
//!
//! 变更连同对原生引擎的转发由 `engine_order` 串行化，引擎看到的调用顺序
//! 与注册表应用变更的顺序一致。转发时节点表的锁已释放，引擎实现可以回调
//! 查询接口，但不能在回调中再发起变更。

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::node::{NodeEntry, Props};
use crate::core::{BridgeError, BridgeResult};
use crate::engine::NativeEngine;

const TARGET: &str = "viro_bridge::scene";

/// 节点注册表
pub struct NodeRegistry {
    nodes: RwLock<HashMap<String, NodeEntry>>,
    engine_order: Mutex<()>,
    engine: Arc<dyn NativeEngine>,
}

/// `add_child` 在锁内计算出的结果
enum Attach {
    Attached { previous: Option<String> },
    AlreadyAttached,
}

impl NodeRegistry {
    /// 创建空注册表
    pub fn new(engine: Arc<dyn NativeEngine>) -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            engine_order: Mutex::new(()),
            engine,
        }
    }

    pub fn engine(&self) -> &Arc<dyn NativeEngine> {
        &self.engine
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, NodeEntry>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, NodeEntry>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 持有到引擎调用返回
    fn ordered(&self) -> MutexGuard<'_, ()> {
        self.engine_order.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 创建节点
    ///
    /// ID已存在时返回 `DuplicateId`；新节点没有父节点、没有子节点。
    pub fn create_node(&self, node_id: &str, node_type: &str, props: Props) -> BridgeResult<()> {
        let _order = self.ordered();
        {
            let mut nodes = self.write();
            if nodes.contains_key(node_id) {
                return Err(BridgeError::DuplicateId(node_id.to_string()));
            }
            nodes.insert(
                node_id.to_string(),
                NodeEntry::new(node_id, node_type, props.clone()),
            );
        }

        tracing::debug!(target: TARGET, "Created node {} ({})", node_id, node_type);
        self.engine.materialize_node(node_id, node_type, &props);
        Ok(())
    }

    /// 合并更新节点属性
    ///
    /// 只把实际变化的键转发给引擎；没有变化时不调用引擎。
    pub fn update_node(&self, node_id: &str, props: Props) -> BridgeResult<()> {
        let _order = self.ordered();
        let delta = {
            let mut nodes = self.write();
            let entry = nodes
                .get_mut(node_id)
                .ok_or_else(|| BridgeError::NotFound(node_id.to_string()))?;
            entry.merge_props(props)
        };

        if delta.is_empty() {
            tracing::trace!(target: TARGET, "Update of {} changed nothing", node_id);
            return Ok(());
        }

        tracing::debug!(target: TARGET, "Updated node {} ({} keys)", node_id, delta.len());
        self.engine.update_node(node_id, &delta);
        Ok(())
    }

    /// 删除节点
    ///
    /// 不存在时为空操作。从父节点的子列表中移除自身，自身的子节点成为
    /// 孤儿（不会级联删除）。
    pub fn delete_node(&self, node_id: &str) -> BridgeResult<()> {
        let _order = self.ordered();
        let removed = {
            let mut nodes = self.write();
            let Some(entry) = nodes.remove(node_id) else {
                tracing::debug!(target: TARGET, "Delete of unknown node {} ignored", node_id);
                return Ok(());
            };

            if let Some(parent_id) = &entry.parent {
                if let Some(parent) = nodes.get_mut(parent_id) {
                    parent.children.retain(|c| c != node_id);
                }
            }
            for child_id in &entry.children {
                if let Some(child) = nodes.get_mut(child_id) {
                    child.parent = None;
                }
            }
            entry
        };

        for child_id in &removed.children {
            self.engine.detach_node(child_id, node_id);
        }
        self.engine.destroy_node(node_id);

        tracing::debug!(
            target: TARGET,
            "Deleted node {} (orphaned {} children)",
            node_id,
            removed.children.len()
        );
        Ok(())
    }

    /// 把 `child_id` 挂到 `parent_id` 下
    ///
    /// - 任一ID不存在：`NotFound`
    /// - `child_id` 是 `parent_id` 自身或其祖先：`CycleDetected`，层级不变
    /// - 边已存在：空操作
    /// - 子节点已有其他父节点：先从旧父节点移走
    pub fn add_child(&self, parent_id: &str, child_id: &str) -> BridgeResult<()> {
        let _order = self.ordered();
        let outcome = {
            let mut nodes = self.write();
            let already_attached = nodes
                .get(parent_id)
                .ok_or_else(|| BridgeError::NotFound(parent_id.to_string()))?
                .has_child(child_id);
            let previous = nodes
                .get(child_id)
                .ok_or_else(|| BridgeError::NotFound(child_id.to_string()))?
                .parent
                .clone();

            if already_attached {
                Attach::AlreadyAttached
            } else {
                if is_ancestor_or_self(&nodes, child_id, parent_id) {
                    return Err(BridgeError::CycleDetected {
                        parent: parent_id.to_string(),
                        child: child_id.to_string(),
                    });
                }

                if let Some(old_parent) = previous.as_deref().and_then(|id| nodes.get_mut(id)) {
                    old_parent.children.retain(|c| c != child_id);
                }
                if let Some(child) = nodes.get_mut(child_id) {
                    child.parent = Some(parent_id.to_string());
                }
                if let Some(parent) = nodes.get_mut(parent_id) {
                    parent.children.push(child_id.to_string());
                }
                Attach::Attached { previous }
            }
        };

        match outcome {
            Attach::AlreadyAttached => {
                tracing::debug!(target: TARGET, "{} is already a child of {}", child_id, parent_id);
            }
            Attach::Attached { previous } => {
                if let Some(previous) = previous {
                    tracing::debug!(target: TARGET, "Moving {} from {} to {}", child_id, previous, parent_id);
                }
                self.engine.reparent_node(child_id, parent_id);
            }
        }
        Ok(())
    }

    /// 移除父子边
    ///
    /// 任一ID不存在时返回 `NotFound`；边不存在时为空操作。
    pub fn remove_child(&self, parent_id: &str, child_id: &str) -> BridgeResult<()> {
        let _order = self.ordered();
        {
            let mut nodes = self.write();
            if !nodes.contains_key(parent_id) {
                return Err(BridgeError::NotFound(parent_id.to_string()));
            }
            let child = nodes
                .get_mut(child_id)
                .ok_or_else(|| BridgeError::NotFound(child_id.to_string()))?;

            if child.parent.as_deref() != Some(parent_id) {
                tracing::debug!(target: TARGET, "{} is not a child of {}; nothing to remove", child_id, parent_id);
                return Ok(());
            }
            child.parent = None;
            if let Some(parent) = nodes.get_mut(parent_id) {
                parent.children.retain(|c| c != child_id);
            }
        }

        self.engine.detach_node(child_id, parent_id);
        Ok(())
    }

    /// 节点快照
    pub fn get(&self, node_id: &str) -> Option<NodeEntry> {
        self.read().get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.read().contains_key(node_id)
    }

    pub fn parent(&self, node_id: &str) -> Option<String> {
        self.read().get(node_id).and_then(|n| n.parent.clone())
    }

    /// 子节点ID（未知节点返回空列表）
    pub fn children(&self, node_id: &str) -> Vec<String> {
        self.read()
            .get(node_id)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// 所有节点ID（已排序）
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// 清空簿记（拆除时使用，不通知引擎）
    pub fn clear(&self) -> usize {
        let _order = self.ordered();
        let mut nodes = self.write();
        let count = nodes.len();
        nodes.clear();
        count
    }
}

/// `candidate` 是否是 `node_id` 自身或其祖先
fn is_ancestor_or_self(nodes: &HashMap<String, NodeEntry>, candidate: &str, node_id: &str) -> bool {
    let mut cursor = Some(node_id);
    while let Some(current) = cursor {
        if current == candidate {
            return true;
        }
        cursor = nodes.get(current).and_then(|n| n.parent.as_deref());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCall, RecordingEngine};
    use serde_json::json;

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    fn registry() -> (Arc<RecordingEngine>, NodeRegistry) {
        let engine = Arc::new(RecordingEngine::new());
        let registry = NodeRegistry::new(engine.clone());
        (engine, registry)
    }

    #[test]
    fn test_create_and_duplicate() {
        let (engine, registry) = registry();
        registry.create_node("n1", "box", props(json!({"color": "red"}))).unwrap();

        let err = registry.create_node("n1", "sphere", Props::new()).unwrap_err();
        assert_eq!(err, BridgeError::DuplicateId("n1".to_string()));

        // 失败的创建不触碰原节点，也不转发给引擎
        assert_eq!(registry.get("n1").unwrap().node_type, "box");
        assert_eq!(engine.calls().len(), 1);
    }

    #[test]
    fn test_update_merges_and_forwards_delta() {
        let (engine, registry) = registry();
        registry.create_node("n1", "box", props(json!({"color": "red"}))).unwrap();
        registry.update_node("n1", props(json!({"size": 2, "color": "red"}))).unwrap();

        assert_eq!(
            registry.get("n1").unwrap().props,
            props(json!({"color": "red", "size": 2}))
        );
        assert_eq!(
            engine.calls().last().unwrap(),
            &EngineCall::Update {
                node_id: "n1".to_string(),
                delta: props(json!({"size": 2})),
            }
        );
    }

    #[test]
    fn test_update_missing() {
        let (engine, registry) = registry();
        let err = registry.update_node("ghost", Props::new()).unwrap_err();
        assert_eq!(err, BridgeError::NotFound("ghost".to_string()));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_delete_is_fail_soft() {
        let (engine, registry) = registry();
        assert!(registry.delete_node("ghost").is_ok());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_delete_orphans_children() {
        let (engine, registry) = registry();
        registry.create_node("root", "scene", Props::new()).unwrap();
        registry.create_node("p", "node", Props::new()).unwrap();
        registry.create_node("c1", "box", Props::new()).unwrap();
        registry.create_node("c2", "box", Props::new()).unwrap();
        registry.add_child("root", "p").unwrap();
        registry.add_child("p", "c1").unwrap();
        registry.add_child("p", "c2").unwrap();
        engine.take_calls();

        registry.delete_node("p").unwrap();

        assert!(!registry.contains("p"));
        assert!(registry.children("root").is_empty());
        assert_eq!(registry.parent("c1"), None);
        assert_eq!(registry.parent("c2"), None);
        assert!(registry.children("p").is_empty());
        assert_eq!(
            engine.take_calls(),
            vec![
                EngineCall::Detach { child_id: "c1".to_string(), parent_id: "p".to_string() },
                EngineCall::Detach { child_id: "c2".to_string(), parent_id: "p".to_string() },
                EngineCall::Destroy("p".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_child_missing() {
        let (_, registry) = registry();
        registry.create_node("p", "node", Props::new()).unwrap();
        assert_eq!(
            registry.add_child("p", "ghost").unwrap_err(),
            BridgeError::NotFound("ghost".to_string())
        );
        assert_eq!(
            registry.add_child("ghost", "p").unwrap_err(),
            BridgeError::NotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_cycle_rejected_and_hierarchy_unchanged() {
        let (engine, registry) = registry();
        registry.create_node("p", "node", Props::new()).unwrap();
        registry.create_node("c", "node", Props::new()).unwrap();
        registry.add_child("p", "c").unwrap();
        engine.take_calls();

        for _ in 0..2 {
            let err = registry.add_child("c", "p").unwrap_err();
            assert!(matches!(err, BridgeError::CycleDetected { .. }));
        }

        assert_eq!(registry.children("p"), vec!["c".to_string()]);
        assert_eq!(registry.parent("c"), Some("p".to_string()));
        assert_eq!(registry.parent("p"), None);
        assert!(registry.children("c").is_empty());
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_self_and_deep_cycle() {
        let (_, registry) = registry();
        for id in ["a", "b", "c"] {
            registry.create_node(id, "node", Props::new()).unwrap();
        }
        registry.add_child("a", "b").unwrap();
        registry.add_child("b", "c").unwrap();

        assert!(matches!(
            registry.add_child("a", "a"),
            Err(BridgeError::CycleDetected { .. })
        ));
        assert!(matches!(
            registry.add_child("c", "a"),
            Err(BridgeError::CycleDetected { .. })
        ));
    }

    #[test]
    fn test_duplicate_edge_is_noop() {
        let (engine, registry) = registry();
        registry.create_node("p", "node", Props::new()).unwrap();
        registry.create_node("c", "node", Props::new()).unwrap();
        registry.add_child("p", "c").unwrap();
        registry.add_child("p", "c").unwrap();

        assert_eq!(registry.children("p"), vec!["c".to_string()]);
        let reparents = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Reparent { .. }))
            .count();
        assert_eq!(reparents, 1);
    }

    #[test]
    fn test_add_child_moves_between_parents() {
        let (_, registry) = registry();
        for id in ["p1", "p2", "c"] {
            registry.create_node(id, "node", Props::new()).unwrap();
        }
        registry.add_child("p1", "c").unwrap();
        registry.add_child("p2", "c").unwrap();

        assert!(registry.children("p1").is_empty());
        assert_eq!(registry.children("p2"), vec!["c".to_string()]);
        assert_eq!(registry.parent("c"), Some("p2".to_string()));
    }

    #[test]
    fn test_children_keep_order() {
        let (_, registry) = registry();
        registry.create_node("p", "node", Props::new()).unwrap();
        for id in ["z", "a", "m"] {
            registry.create_node(id, "box", Props::new()).unwrap();
            registry.add_child("p", id).unwrap();
        }
        assert_eq!(registry.children("p"), vec!["z", "a", "m"]);
    }

    #[test]
    fn test_remove_child() {
        let (engine, registry) = registry();
        registry.create_node("p", "node", Props::new()).unwrap();
        registry.create_node("c", "node", Props::new()).unwrap();

        // 边不存在：空操作
        registry.remove_child("p", "c").unwrap();
        assert!(engine.calls().iter().all(|c| !matches!(c, EngineCall::Detach { .. })));

        registry.add_child("p", "c").unwrap();
        registry.remove_child("p", "c").unwrap();
        assert_eq!(registry.parent("c"), None);
        assert!(registry.children("p").is_empty());
        assert_eq!(
            engine.calls().last().unwrap(),
            &EngineCall::Detach { child_id: "c".to_string(), parent_id: "p".to_string() }
        );

        assert_eq!(
            registry.remove_child("p", "ghost").unwrap_err(),
            BridgeError::NotFound("ghost".to_string())
        );
    }

    /// 物化较慢的引擎，只记录调用顺序
    struct SlowEngine {
        log: Mutex<Vec<String>>,
    }

    impl NativeEngine for SlowEngine {
        fn materialize_node(&self, node_id: &str, _node_type: &str, _props: &Props) {
            std::thread::sleep(std::time::Duration::from_millis(50));
            self.log.lock().unwrap().push(format!("materialize {}", node_id));
        }

        fn update_node(&self, node_id: &str, _delta: &Props) {
            self.log.lock().unwrap().push(format!("update {}", node_id));
        }

        fn destroy_node(&self, node_id: &str) {
            self.log.lock().unwrap().push(format!("destroy {}", node_id));
        }

        fn reparent_node(&self, child_id: &str, new_parent_id: &str) {
            self.log.lock().unwrap().push(format!("reparent {} {}", child_id, new_parent_id));
        }

        fn detach_node(&self, child_id: &str, old_parent_id: &str) {
            self.log.lock().unwrap().push(format!("detach {} {}", child_id, old_parent_id));
        }
    }

    #[test]
    fn test_engine_sees_concurrent_mutations_in_registry_order() {
        let engine = Arc::new(SlowEngine { log: Mutex::new(Vec::new()) });
        let registry = Arc::new(NodeRegistry::new(engine.clone()));

        let creator = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.create_node("n1", "box", Props::new()))
        };
        // 节点已入表时引擎可能还在物化
        while !registry.contains("n1") {
            std::thread::yield_now();
        }
        registry.delete_node("n1").unwrap();
        creator.join().unwrap().unwrap();

        assert!(!registry.contains("n1"));
        assert_eq!(*engine.log.lock().unwrap(), vec!["materialize n1", "destroy n1"]);
    }

    #[test]
    fn test_clear() {
        let (engine, registry) = registry();
        registry.create_node("a", "node", Props::new()).unwrap();
        registry.create_node("b", "node", Props::new()).unwrap();
        engine.take_calls();

        assert_eq!(registry.clear(), 2);
        assert!(registry.is_empty());
        assert!(engine.calls().is_empty());
    }
}
