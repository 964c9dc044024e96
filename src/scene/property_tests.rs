//! 节点注册表属性测试
//!
//! 使用proptest对任意命令序列验证层级不变式

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use proptest::prelude::*;

    use crate::core::BridgeError;
    use crate::engine::RecordingEngine;
    use crate::scene::{NodeRegistry, Props};

    #[derive(Debug, Clone)]
    enum Op {
        Create(u8),
        Delete(u8),
        AddChild(u8, u8),
        RemoveChild(u8, u8),
    }

    fn id(n: u8) -> String {
        format!("n{}", n)
    }

    // 小ID池让冲突、环和孤儿足够频繁
    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..8).prop_map(Op::Create),
            (0u8..8).prop_map(Op::Delete),
            (0u8..8, 0u8..8).prop_map(|(p, c)| Op::AddChild(p, c)),
            (0u8..8, 0u8..8).prop_map(|(p, c)| Op::RemoveChild(p, c)),
        ]
    }

    fn assert_consistent(registry: &NodeRegistry) -> Result<(), TestCaseError> {
        let ids = registry.ids();
        let unique: HashSet<&String> = ids.iter().collect();
        prop_assert_eq!(unique.len(), ids.len());

        for node_id in &ids {
            let node = registry.get(node_id).unwrap();
            let children: HashSet<&String> = node.children.iter().collect();
            prop_assert_eq!(children.len(), node.children.len(), "duplicate child in {}", node_id);

            for child in &node.children {
                prop_assert_eq!(registry.parent(child), Some(node_id.clone()));
            }
            if let Some(parent) = &node.parent {
                prop_assert!(registry.children(parent).contains(node_id));
            }

            // 沿父指针向上走不能回到自身
            let mut seen = HashSet::new();
            let mut cursor = node.parent.clone();
            while let Some(current) = cursor {
                prop_assert!(seen.insert(current.clone()), "cycle through {}", current);
                prop_assert_ne!(&current, node_id);
                cursor = registry.parent(&current);
            }
        }
        Ok(())
    }

    proptest! {
        #[test]
        fn hierarchy_stays_consistent(ops in prop::collection::vec(op(), 1..64)) {
            let registry = NodeRegistry::new(Arc::new(RecordingEngine::new()));

            for op in ops {
                match op {
                    Op::Create(n) => {
                        let existed = registry.contains(&id(n));
                        let result = registry.create_node(&id(n), "node", Props::new());
                        prop_assert_eq!(result.is_err(), existed);
                    }
                    Op::Delete(n) => {
                        prop_assert!(registry.delete_node(&id(n)).is_ok());
                        prop_assert!(!registry.contains(&id(n)));
                    }
                    Op::AddChild(p, c) => {
                        let before_parent = registry.parent(&id(c));
                        match registry.add_child(&id(p), &id(c)) {
                            Ok(()) => {
                                prop_assert_eq!(registry.parent(&id(c)), Some(id(p)));
                            }
                            Err(BridgeError::CycleDetected { .. }) => {
                                prop_assert_eq!(registry.parent(&id(c)), before_parent);
                            }
                            Err(BridgeError::NotFound(_)) => {}
                            Err(other) => {
                                prop_assert!(false, "unexpected error {:?}", other);
                            }
                        }
                    }
                    Op::RemoveChild(p, c) => {
                        let _ = registry.remove_child(&id(p), &id(c));
                        prop_assert_ne!(registry.parent(&id(c)), Some(id(p)));
                    }
                }
                assert_consistent(&registry)?;
            }
        }

        #[test]
        fn reverse_edge_always_cycles(a in 0u8..8, b in 0u8..8) {
            prop_assume!(a != b);
            let registry = NodeRegistry::new(Arc::new(RecordingEngine::new()));
            registry.create_node(&id(a), "node", Props::new()).unwrap();
            registry.create_node(&id(b), "node", Props::new()).unwrap();
            registry.add_child(&id(a), &id(b)).unwrap();

            let is_cycle = matches!(
                registry.add_child(&id(b), &id(a)),
                Err(BridgeError::CycleDetected { .. })
            );
            prop_assert!(is_cycle);
            prop_assert_eq!(registry.children(&id(a)), vec![id(b)]);
            prop_assert!(registry.children(&id(b)).is_empty());
        }
    }
}
