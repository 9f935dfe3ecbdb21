//! Branch detection over a conversation's reply tree
//!
//! A message with more than one child is a branch point. One child continues
//! the parent's branch (the "main" continuation, chosen by [`BranchPolicy`]);
//! every other child opens a new branch one level deeper. Branch ids compound:
//! children forking off `main` get `branch-N`, forks inside `branch-N` get
//! `branch-N.M`, where N and M come from one counter shared by the whole
//! conversation so trailing numbers never repeat.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::models::{BranchAnnotation, Message, MAIN_BRANCH};
use crate::shared::logging;

use super::tree::{BranchWarning, MessageTree};

/// Which child continues the parent's branch at a branch point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BranchPolicy {
    /// First child in source order (the original reply)
    #[default]
    FirstCreated,
    /// Child with the latest timestamp (the latest edit/regeneration);
    /// ties and missing timestamps fall back to the later child in source order
    MostRecent,
}

impl std::str::FromStr for BranchPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "first_created" | "first" => Ok(BranchPolicy::FirstCreated),
            "most_recent" | "latest" => Ok(BranchPolicy::MostRecent),
            _ => Err(format!("Unknown branch policy: {}", s)),
        }
    }
}

impl BranchPolicy {
    /// Pick the continuing child among `candidates` (non-empty, source order)
    fn choose(&self, candidates: &[usize], messages: &[Message]) -> usize {
        match self {
            BranchPolicy::FirstCreated => candidates[0],
            BranchPolicy::MostRecent => {
                let mut best = candidates[0];
                for &idx in &candidates[1..] {
                    let current = messages[idx].timestamp.as_deref().unwrap_or("");
                    let leader = messages[best].timestamp.as_deref().unwrap_or("");
                    if current >= leader {
                        best = idx;
                    }
                }
                best
            }
        }
    }
}

/// Messages of one conversation annotated with their branch placement
#[derive(Debug, Clone)]
pub struct BranchGraph {
    messages: Vec<Message>,
    tree: MessageTree,
    /// Continuing child per message (None for leaves)
    main_child: Vec<Option<usize>>,
    /// First index of each uuid
    by_uuid: HashMap<String, usize>,
}

/// Annotate every message with `branch_id`, `branch_level`, `is_branch_point`
/// and `child_count`. The input is left untouched; previously attached
/// annotations are ignored.
pub fn detect_branches(messages: &[Message], policy: BranchPolicy) -> BranchGraph {
    let tree = MessageTree::build(messages);
    let n = messages.len();

    let mut annotations: Vec<Option<BranchAnnotation>> = vec![None; n];
    let mut main_child: Vec<Option<usize>> = vec![None; n];
    let mut next_branch = 1usize;
    let mut branch_points = 0usize;

    // Seed: one root continues "main", any other root opens its own branch
    let mut stack: Vec<(usize, String, u32)> = Vec::new();
    if !tree.roots.is_empty() {
        let main_root = policy.choose(&tree.roots, messages);
        let mut seeds = Vec::with_capacity(tree.roots.len());
        for &root in &tree.roots {
            if root == main_root {
                seeds.push((root, MAIN_BRANCH.to_string(), 0));
            } else {
                seeds.push((root, format!("root-{}", next_branch), 0));
                next_branch += 1;
            }
        }
        stack.extend(seeds.into_iter().rev());
    }

    while let Some((idx, branch_id, level)) = stack.pop() {
        let kids = &tree.children[idx];
        let is_branch_point = kids.len() > 1;

        let mut pushed = Vec::with_capacity(kids.len());
        if kids.len() == 1 {
            main_child[idx] = Some(kids[0]);
            pushed.push((kids[0], branch_id.clone(), level));
        } else if is_branch_point {
            branch_points += 1;
            let keep = policy.choose(kids, messages);
            main_child[idx] = Some(keep);
            for &child in kids {
                if child == keep {
                    pushed.push((child, branch_id.clone(), level));
                } else {
                    pushed.push((child, child_branch_id(&branch_id, next_branch), level + 1));
                    next_branch += 1;
                }
            }
        }

        annotations[idx] = Some(BranchAnnotation {
            branch_id,
            branch_level: level,
            is_branch_point,
            child_count: kids.len(),
        });
        stack.extend(pushed.into_iter().rev());
    }

    let annotated: Vec<Message> = messages
        .iter()
        .zip(annotations)
        .map(|(msg, annotation)| {
            let mut out = msg.clone();
            out.branch = annotation.unwrap_or_default();
            out
        })
        .collect();

    let mut by_uuid = HashMap::with_capacity(n);
    for (idx, msg) in annotated.iter().enumerate() {
        by_uuid.entry(msg.uuid.clone()).or_insert(idx);
    }

    let graph = BranchGraph { messages: annotated, tree, main_child, by_uuid };
    logging::log_branch_result(n, branch_points, graph.branch_ids().len());
    graph
}

fn child_branch_id(parent_branch: &str, ordinal: usize) -> String {
    if parent_branch == MAIN_BRANCH {
        format!("branch-{}", ordinal)
    } else {
        format!("{}.{}", parent_branch, ordinal)
    }
}

impl BranchGraph {
    /// Annotated messages in source order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Anomalies repaired while building the graph (warning-level, never fatal)
    pub fn warnings(&self) -> &[BranchWarning] {
        &self.tree.warnings
    }

    pub fn tree(&self) -> &MessageTree {
        &self.tree
    }

    pub fn branch_points(&self) -> Vec<&Message> {
        self.messages.iter().filter(|m| m.branch.is_branch_point).collect()
    }

    /// Distinct branch ids in order of first appearance in the source list
    pub fn branch_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for msg in &self.messages {
            if !ids.contains(&msg.branch.branch_id) {
                ids.push(msg.branch.branch_id.clone());
            }
        }
        ids
    }

    /// Children of a message, in source order
    pub fn children_of(&self, uuid: &str) -> Vec<&Message> {
        self.index_of(uuid)
            .map(|idx| self.tree.children[idx].iter().map(|&c| &self.messages[c]).collect())
            .unwrap_or_default()
    }

    /// The child continuing this message's branch, if any
    pub fn main_child_of(&self, uuid: &str) -> Option<&Message> {
        self.index_of(uuid)
            .and_then(|idx| self.main_child[idx])
            .map(|c| &self.messages[c])
    }

    /// Messages in depth-first traversal order (parents before children)
    pub fn traversal_order(&self) -> Vec<&Message> {
        self.tree.preorder().into_iter().map(|idx| &self.messages[idx]).collect()
    }

    /// Size of the subtree under `uuid`, the message itself included
    pub fn subtree_size(&self, uuid: &str) -> usize {
        self.index_of(uuid).map(|idx| self.tree.subtree_size(idx)).unwrap_or(0)
    }

    /// Branch ids reachable at a branch point, continuation first
    pub fn branches_at(&self, uuid: &str) -> Vec<String> {
        let Some(idx) = self.index_of(uuid) else {
            return Vec::new();
        };
        let mut ids = Vec::new();
        if let Some(main) = self.main_child[idx] {
            ids.push(self.messages[main].branch.branch_id.clone());
        }
        for &child in &self.tree.children[idx] {
            let id = &self.messages[child].branch.branch_id;
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids
    }

    fn index_of(&self, uuid: &str) -> Option<usize> {
        self.by_uuid.get(uuid).copied()
    }

    /// Count of messages per branch id
    pub fn branch_sizes(&self) -> HashMap<String, usize> {
        let mut sizes = HashMap::new();
        for msg in &self.messages {
            *sizes.entry(msg.branch.branch_id.clone()).or_insert(0) += 1;
        }
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Sender;

    fn make_msg(uuid: &str, parent: Option<&str>, ts: &str) -> Message {
        let sender = if uuid.starts_with('h') { Sender::Human } else { Sender::Assistant };
        let mut msg = Message::new(uuid, parent.map(String::from), sender, format!("text {}", uuid));
        msg.timestamp = Some(ts.to_string());
        msg
    }

    /// h1 -> a1 -> h2 -> a2
    ///              \-> h2b -> a2b
    ///                   \-> h2c
    fn make_forked() -> Vec<Message> {
        vec![
            make_msg("h1", None, "2025-01-01T10:00:00Z"),
            make_msg("a1", Some("h1"), "2025-01-01T10:00:01Z"),
            make_msg("h2", Some("a1"), "2025-01-01T10:00:02Z"),
            make_msg("a2", Some("h2"), "2025-01-01T10:00:03Z"),
            make_msg("h2b", Some("a1"), "2025-01-01T10:05:00Z"),
            make_msg("a2b", Some("h2b"), "2025-01-01T10:05:01Z"),
            make_msg("h2c", Some("a1"), "2025-01-01T10:06:00Z"),
        ]
    }

    fn branch_of<'a>(graph: &'a BranchGraph, uuid: &str) -> &'a BranchAnnotation {
        &graph.messages().iter().find(|m| m.uuid == uuid).unwrap().branch
    }

    #[test]
    fn test_linear_conversation_is_all_main() {
        let messages = vec![
            make_msg("h1", None, "1"),
            make_msg("a1", Some("h1"), "2"),
            make_msg("h2", Some("a1"), "3"),
        ];
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);

        for msg in graph.messages() {
            assert_eq!(msg.branch.branch_id, "main");
            assert_eq!(msg.branch.branch_level, 0);
            assert!(!msg.branch.is_branch_point);
        }
        assert!(graph.warnings().is_empty());
    }

    #[test]
    fn test_branch_point_first_created_policy() {
        let graph = detect_branches(&make_forked(), BranchPolicy::FirstCreated);

        let fork = branch_of(&graph, "a1");
        assert!(fork.is_branch_point);
        assert_eq!(fork.child_count, 3);

        assert_eq!(branch_of(&graph, "h2").branch_id, "main");
        assert_eq!(branch_of(&graph, "a2").branch_id, "main");
        assert_eq!(branch_of(&graph, "h2b").branch_id, "branch-1");
        assert_eq!(branch_of(&graph, "h2b").branch_level, 1);
        assert_eq!(branch_of(&graph, "a2b").branch_id, "branch-1");
        assert_eq!(branch_of(&graph, "h2c").branch_id, "branch-2");
        assert_eq!(graph.main_child_of("a1").unwrap().uuid, "h2");
    }

    #[test]
    fn test_branch_point_most_recent_policy() {
        let graph = detect_branches(&make_forked(), BranchPolicy::MostRecent);

        assert_eq!(branch_of(&graph, "h2c").branch_id, "main");
        assert_eq!(branch_of(&graph, "h2").branch_id, "branch-1");
        assert_eq!(branch_of(&graph, "a2").branch_id, "branch-1");
        assert_eq!(branch_of(&graph, "h2b").branch_id, "branch-2");
    }

    #[test]
    fn test_nested_branches_compound_ids() {
        let mut messages = make_forked();
        messages.push(make_msg("a2b-alt", Some("h2b"), "2025-01-01T10:07:00Z"));
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);

        let nested = branch_of(&graph, "a2b-alt");
        assert_eq!(nested.branch_id, "branch-1.3");
        assert_eq!(nested.branch_level, 2);
        assert!(branch_of(&graph, "h2b").is_branch_point);
    }

    #[test]
    fn test_rebranching_is_idempotent() {
        let first = detect_branches(&make_forked(), BranchPolicy::FirstCreated).into_messages();
        let second = detect_branches(&first, BranchPolicy::FirstCreated).into_messages();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parent_precedes_child_in_traversal() {
        let graph = detect_branches(&make_forked(), BranchPolicy::FirstCreated);
        let order: Vec<&str> = graph.traversal_order().iter().map(|m| m.uuid.as_str()).collect();

        for msg in graph.messages() {
            if let Some(parent) = &msg.parent_uuid {
                let p = order.iter().position(|u| u == parent).unwrap();
                let c = order.iter().position(|u| *u == msg.uuid).unwrap();
                assert!(p < c, "{} should precede {}", parent, msg.uuid);
            }
        }
    }

    #[test]
    fn test_side_subtrees_cover_non_main_descendants() {
        let graph = detect_branches(&make_forked(), BranchPolicy::FirstCreated);
        for point in graph.branch_points() {
            let main = graph.main_child_of(&point.uuid).unwrap();
            let side: usize = graph
                .children_of(&point.uuid)
                .iter()
                .filter(|c| c.uuid != main.uuid)
                .map(|c| graph.subtree_size(&c.uuid))
                .sum();
            let total_below = graph.subtree_size(&point.uuid) - 1;
            let main_path = graph.subtree_size(&main.uuid);
            assert_eq!(side, total_below - main_path);
        }
    }

    #[test]
    fn test_orphans_get_own_branch() {
        let messages = vec![
            make_msg("h1", None, "1"),
            make_msg("a1", Some("h1"), "2"),
            make_msg("x1", Some("missing"), "3"),
        ];
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);

        assert_eq!(branch_of(&graph, "h1").branch_id, "main");
        assert_eq!(branch_of(&graph, "x1").branch_id, "root-1");
        assert_eq!(branch_of(&graph, "x1").branch_level, 0);
        assert_eq!(graph.warnings().len(), 1);
    }

    #[test]
    fn test_cycle_does_not_hang() {
        let messages = vec![
            make_msg("h1", Some("a1"), "1"),
            make_msg("a1", Some("h1"), "2"),
        ];
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);
        assert_eq!(graph.messages().len(), 2);
        assert!(graph.messages().iter().all(|m| m.branch.branch_id == "main"));
    }

    #[test]
    fn test_branches_at_lists_continuation_first() {
        let graph = detect_branches(&make_forked(), BranchPolicy::MostRecent);
        assert_eq!(graph.branches_at("a1"), vec!["main", "branch-1", "branch-2"]);
    }

    #[test]
    fn test_lookup_by_uuid_on_long_chain() {
        let mut messages = vec![make_msg("h0", None, "2025-01-01T10:00:00Z")];
        for i in 1..5_000 {
            let parent = format!("h{}", i - 1);
            messages.push(make_msg(&format!("h{}", i), Some(&parent), "2025-01-01T10:00:00Z"));
        }
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);

        assert_eq!(graph.main_child_of("h0").map(|m| m.uuid.as_str()), Some("h1"));
        assert_eq!(graph.main_child_of("h4998").map(|m| m.uuid.as_str()), Some("h4999"));
        assert!(graph.main_child_of("h4999").is_none());
        assert_eq!(graph.subtree_size("h4990"), 10);
        assert_eq!(graph.subtree_size("missing"), 0);
        assert!(graph.children_of("missing").is_empty());
    }

    #[test]
    fn test_duplicate_uuid_resolves_to_first() {
        let mut messages = make_forked();
        messages.push(make_msg("a1", None, "2025-01-01T11:00:00Z"));
        let graph = detect_branches(&messages, BranchPolicy::FirstCreated);
        let children: Vec<&str> = graph.children_of("a1").iter().map(|m| m.uuid.as_str()).collect();
        assert_eq!(children, vec!["h2", "h2b", "h2c"]);
    }
}
