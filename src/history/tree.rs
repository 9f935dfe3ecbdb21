//! Parent-pointer repair and index-based adjacency for one conversation
//!
//! Builds an arena view (indices into the source slice) of the reply tree.
//! Malformed links never abort the build: self-parents, dangling parents and
//! cycles are cut, the affected message becomes a root, and a warning is
//! recorded for the caller.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::domain::models::Message;
use crate::shared::logging;

/// Graph anomaly repaired while building the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BranchWarning {
    /// Uuid seen before; only the first occurrence can be a parent
    DuplicateUuid { uuid: String },
    /// Message names itself as parent
    SelfParent { uuid: String },
    /// Parent uuid does not exist in the conversation
    DanglingParent { uuid: String, parent_uuid: String },
    /// Parent chain loops back; the link into this message was cut
    CycleBroken { uuid: String },
}

impl BranchWarning {
    pub fn uuid(&self) -> &str {
        match self {
            BranchWarning::DuplicateUuid { uuid }
            | BranchWarning::SelfParent { uuid }
            | BranchWarning::DanglingParent { uuid, .. }
            | BranchWarning::CycleBroken { uuid } => uuid,
        }
    }

    fn describe(&self) -> String {
        match self {
            BranchWarning::DuplicateUuid { .. } => "duplicate uuid".to_string(),
            BranchWarning::SelfParent { .. } => "message is its own parent".to_string(),
            BranchWarning::DanglingParent { parent_uuid, .. } => {
                format!("parent {} not found, treated as root", parent_uuid)
            }
            BranchWarning::CycleBroken { .. } => "parent cycle broken, treated as root".to_string(),
        }
    }
}

/// Arena of indices over a message slice
#[derive(Debug, Clone)]
pub struct MessageTree {
    /// Repaired parent index per message
    pub parents: Vec<Option<usize>>,
    /// Children per message, in source order
    pub children: Vec<Vec<usize>>,
    /// Children of the virtual root: parentless, dangling and cycle-broken messages
    pub roots: Vec<usize>,
    pub warnings: Vec<BranchWarning>,
}

impl MessageTree {
    pub fn build(messages: &[Message]) -> Self {
        let n = messages.len();
        let mut warnings = Vec::new();

        let mut by_uuid: HashMap<&str, usize> = HashMap::with_capacity(n);
        for (idx, msg) in messages.iter().enumerate() {
            if by_uuid.contains_key(msg.uuid.as_str()) {
                warnings.push(BranchWarning::DuplicateUuid { uuid: msg.uuid.clone() });
            } else {
                by_uuid.insert(msg.uuid.as_str(), idx);
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(n);
        for (idx, msg) in messages.iter().enumerate() {
            let parent = match msg.parent_uuid.as_deref() {
                None => None,
                Some(p) if p == msg.uuid => {
                    warnings.push(BranchWarning::SelfParent { uuid: msg.uuid.clone() });
                    None
                }
                Some(p) => match by_uuid.get(p) {
                    Some(&parent_idx) if parent_idx != idx => Some(parent_idx),
                    Some(_) => {
                        warnings.push(BranchWarning::SelfParent { uuid: msg.uuid.clone() });
                        None
                    }
                    None => {
                        warnings.push(BranchWarning::DanglingParent {
                            uuid: msg.uuid.clone(),
                            parent_uuid: p.to_string(),
                        });
                        None
                    }
                },
            };
            parents.push(parent);
        }

        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut roots = Vec::new();
        for (idx, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => children[*p].push(idx),
                None => roots.push(idx),
            }
        }

        let mut tree = MessageTree { parents, children, roots, warnings };
        tree.break_cycles(messages);

        for warning in &tree.warnings {
            logging::log_branch_warning(warning.uuid(), &warning.describe());
        }

        tree
    }

    /// Anything not reachable from a root hangs off a parent cycle.
    /// Walk up from the first unreached message until a node repeats, cut
    /// that node's parent link and make it a root. Repeat until all reached.
    fn break_cycles(&mut self, messages: &[Message]) {
        let mut reached = vec![false; self.parents.len()];
        for &root in &self.roots.clone() {
            self.mark_reached(root, &mut reached);
        }

        while let Some(start) = reached.iter().position(|r| !r) {
            let mut seen = HashSet::new();
            let mut cursor = start;
            while seen.insert(cursor) {
                match self.parents[cursor] {
                    Some(p) => cursor = p,
                    None => break,
                }
            }

            if let Some(old_parent) = self.parents[cursor].take() {
                self.children[old_parent].retain(|&c| c != cursor);
            }
            self.roots.push(cursor);
            self.warnings.push(BranchWarning::CycleBroken {
                uuid: messages[cursor].uuid.clone(),
            });
            self.mark_reached(cursor, &mut reached);
        }
    }

    fn mark_reached(&self, from: usize, reached: &mut [bool]) {
        let mut stack = vec![from];
        while let Some(idx) = stack.pop() {
            if reached[idx] {
                continue;
            }
            reached[idx] = true;
            stack.extend(self.children[idx].iter().copied());
        }
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Depth-first preorder from the virtual root. Every parent precedes its children.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(idx) = stack.pop() {
            order.push(idx);
            stack.extend(self.children[idx].iter().rev().copied());
        }
        order
    }

    /// Number of messages in the subtree rooted at `idx`, itself included
    pub fn subtree_size(&self, idx: usize) -> usize {
        let mut count = 0;
        let mut stack = vec![idx];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(self.children[node].iter().copied());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Sender;

    fn make_msg(uuid: &str, parent: Option<&str>) -> Message {
        Message::new(uuid, parent.map(String::from), Sender::Human, uuid)
    }

    #[test]
    fn test_build_linear_chain() {
        let messages = vec![make_msg("a", None), make_msg("b", Some("a")), make_msg("c", Some("b"))];
        let tree = MessageTree::build(&messages);

        assert_eq!(tree.roots, vec![0]);
        assert_eq!(tree.children[0], vec![1]);
        assert_eq!(tree.children[1], vec![2]);
        assert!(tree.warnings.is_empty());
        assert_eq!(tree.preorder(), vec![0, 1, 2]);
    }

    #[test]
    fn test_dangling_parent_becomes_root() {
        let messages = vec![make_msg("a", None), make_msg("b", Some("ghost"))];
        let tree = MessageTree::build(&messages);

        assert_eq!(tree.roots, vec![0, 1]);
        assert_eq!(
            tree.warnings,
            vec![BranchWarning::DanglingParent { uuid: "b".into(), parent_uuid: "ghost".into() }]
        );
    }

    #[test]
    fn test_cycle_is_broken() {
        // a <- b <- c <- a, plus a proper root r
        let messages = vec![
            make_msg("r", None),
            make_msg("a", Some("c")),
            make_msg("b", Some("a")),
            make_msg("c", Some("b")),
        ];
        let tree = MessageTree::build(&messages);

        assert_eq!(tree.roots.len(), 2);
        assert!(tree.warnings.iter().any(|w| matches!(w, BranchWarning::CycleBroken { .. })));
        let order = tree.preorder();
        assert_eq!(order.len(), 4);
        let unique: HashSet<_> = order.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_self_parent_and_duplicates() {
        let messages = vec![make_msg("a", Some("a")), make_msg("a", None)];
        let tree = MessageTree::build(&messages);

        assert_eq!(tree.roots, vec![0, 1]);
        assert!(tree.warnings.contains(&BranchWarning::SelfParent { uuid: "a".into() }));
        assert!(tree.warnings.contains(&BranchWarning::DuplicateUuid { uuid: "a".into() }));
    }

    #[test]
    fn test_subtree_size() {
        let messages = vec![
            make_msg("a", None),
            make_msg("b", Some("a")),
            make_msg("c", Some("a")),
            make_msg("d", Some("c")),
        ];
        let tree = MessageTree::build(&messages);
        assert_eq!(tree.subtree_size(0), 4);
        assert_eq!(tree.subtree_size(2), 2);
    }
}
