//! 场景节点条目

use serde::{Deserialize, Serialize};

/// 有序属性表（插入顺序保留）
pub type Props = serde_json::Map<String, serde_json::Value>;

/// 节点表中的一个条目
///
/// `parent` 与 `children` 由 [`super::NodeRegistry`] 保持双向一致。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// 外部分配的唯一ID
    pub id: String,
    /// 引擎节点类型（"box"、"scene"、"arPlane"...），桥接层不解析
    pub node_type: String,
    pub props: Props,
    pub parent: Option<String>,
    /// 有序、无重复
    pub children: Vec<String>,
}

impl NodeEntry {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, props: Props) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            props,
            parent: None,
            children: Vec::new(),
        }
    }

    /// 合并属性：新键插入，已有键覆盖，未提及的键保留。
    ///
    /// 返回实际发生变化的键值（差异）。
    pub fn merge_props(&mut self, props: Props) -> Props {
        let mut delta = Props::new();
        for (key, value) in props {
            if self.props.get(&key) != Some(&value) {
                self.props.insert(key.clone(), value.clone());
                delta.insert(key, value);
            }
        }
        delta
    }

    pub fn has_child(&self, child_id: &str) -> bool {
        self.children.iter().any(|c| c == child_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(value: serde_json::Value) -> Props {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_merge_props() {
        let mut node = NodeEntry::new("n1", "box", props(json!({"color": "red", "size": 1})));
        let delta = node.merge_props(props(json!({"size": 2, "opacity": 0.5})));

        assert_eq!(node.props, props(json!({"color": "red", "size": 2, "opacity": 0.5})));
        assert_eq!(delta, props(json!({"size": 2, "opacity": 0.5})));
    }

    #[test]
    fn test_merge_unchanged_is_empty_delta() {
        let mut node = NodeEntry::new("n1", "box", props(json!({"color": "red"})));
        let delta = node.merge_props(props(json!({"color": "red"})));
        assert!(delta.is_empty());
    }

    #[test]
    fn test_merge_keeps_order() {
        let mut node = NodeEntry::new("n1", "text", props(json!({"b": 1, "a": 2})));
        node.merge_props(props(json!({"c": 3})));
        let keys: Vec<_> = node.props.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }
}
