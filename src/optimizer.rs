use crate::resolver::ResolvedNode;

/// Hoists duplicate subtree entries to the shallowest position where they
/// are unique. One bottom-up pass: children are optimized
/// recursively first, then grandchildren of the current node are
/// considered for hoisting one level up.
pub struct TreeOptimizer;

impl TreeOptimizer {
    pub fn optimize(node: ResolvedNode) -> ResolvedNode {
        let mut children: Vec<ResolvedNode> = node
            .children
            .into_iter()
            .map(TreeOptimizer::optimize)
            .collect();

        // Only the children that existed going into this node's pass are
        // examined for grandchild-hoisting; anything hoisted up during this
        // pass is appended to the end and left for the parent's own pass to
        // consider hoisting further.
        let original_len = children.len();
        let mut i = 0;
        while i < original_len {
            let grandchildren = std::mem::take(&mut children[i].children);
            let mut kept_grandchildren = Vec::with_capacity(grandchildren.len());

            for grandchild in grandchildren {
                match children.iter().position(|sibling| sibling.name == grandchild.name) {
                    None => {
                        // No sibling with this name: hoist the grandchild up
                        // to the current node's children. It becomes a
                        // candidate for hoisting again once the parent of
                        // `node` processes this level.
                        children.push(grandchild);
                    }
                    Some(sibling_index) if children[sibling_index].reference == grandchild.reference => {
                        // A sibling already provides the same reference:
                        // the grandchild is redundant, drop it.
                    }
                    Some(_) => {
                        // Sibling exists with a different reference: cannot
                        // hoist without a version conflict, keep nested.
                        kept_grandchildren.push(grandchild);
                    }
                }
            }

            children[i].children = kept_grandchildren;
            i += 1;
        }

        ResolvedNode {
            name: node.name,
            reference: node.reference,
            children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Reference;

    fn leaf(name: &str, version: &str) -> ResolvedNode {
        ResolvedNode {
            name: name.to_string(),
            reference: Reference::new(version),
            children: vec![],
        }
    }

    fn node(name: &str, version: &str, children: Vec<ResolvedNode>) -> ResolvedNode {
        ResolvedNode {
            name: name.to_string(),
            reference: Reference::new(version),
            children,
        }
    }

    #[test]
    fn hoists_shared_identical_subtree() {
        // root -> a@1 -> c@1, root -> b@1 -> c@1
        let root = ResolvedNode::root(vec![
            node("a", "1.0.0", vec![leaf("c", "1.0.0")]),
            node("b", "1.0.0", vec![leaf("c", "1.0.0")]),
        ]);

        let optimized = TreeOptimizer::optimize(root);

        let names: Vec<&str> = optimized.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        for child in &optimized.children {
            if child.name != "c" {
                assert!(child.children.is_empty(), "{} should have lost its c child", child.name);
            }
        }
    }

    #[test]
    fn version_conflict_keeps_one_nested() {
        // root -> a@1 -> c@1, root -> b@1 -> c@2
        let root = ResolvedNode::root(vec![
            node("a", "1.0.0", vec![leaf("c", "1.0.0")]),
            node("b", "1.0.0", vec![leaf("c", "2.0.0")]),
        ]);

        let optimized = TreeOptimizer::optimize(root);

        let hoisted_c_count = optimized.children.iter().filter(|c| c.name == "c").count();
        assert_eq!(hoisted_c_count, 1, "exactly one c should reach the root");

        let nested_c_count: usize = optimized
            .children
            .iter()
            .filter(|c| c.name != "c")
            .map(|c| c.children.iter().filter(|gc| gc.name == "c").count())
            .sum();
        assert_eq!(nested_c_count, 1, "the other c should remain nested");
    }

    #[test]
    fn siblings_remain_unique_by_name() {
        let root = ResolvedNode::root(vec![
            node("a", "1.0.0", vec![leaf("shared", "1.0.0"), leaf("shared", "1.0.0")]),
        ]);

        let optimized = TreeOptimizer::optimize(root);
        let shared_count = optimized.children.iter().filter(|c| c.name == "shared").count();
        assert!(shared_count <= 1);
    }
}
