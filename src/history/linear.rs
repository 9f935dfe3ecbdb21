//! Current-branch filtering for the timeline
//!
//! Walks the annotated reply tree from the root and, at each branch point,
//! follows only the selected child. The result keeps source order.

use std::collections::{HashMap, HashSet};

use crate::domain::models::{Message, MAIN_BRANCH};
use crate::shared::logging;

use super::tree::MessageTree;

/// Selected branch per branch point: `branch_point_uuid -> branch_id`.
/// The virtual root (several top-level messages) is keyed by [`ROOT_BRANCH_POINT`].
pub type BranchSelection = HashMap<String, String>;

pub const ROOT_BRANCH_POINT: &str = "__root__";

/// Messages shown for the given selection.
///
/// With `show_all_branches` every message is returned. Otherwise the walk
/// follows, at each branch point, the child whose `branch_id` matches the
/// selection; absent or unknown selections follow the child continuing the
/// current branch (`main` on the main line).
pub fn select_linear(
    messages: &[Message],
    selection: &BranchSelection,
    show_all_branches: bool,
) -> Vec<Message> {
    if show_all_branches {
        return messages.to_vec();
    }

    let included = linear_indices(messages, selection);
    messages
        .iter()
        .enumerate()
        .filter(|(idx, _)| included.contains(idx))
        .map(|(_, msg)| msg.clone())
        .collect()
}

fn linear_indices(messages: &[Message], selection: &BranchSelection) -> HashSet<usize> {
    let tree = MessageTree::build(messages);
    let mut included = HashSet::new();

    let Some(mut cursor) = pick_child(messages, &tree.roots, ROOT_BRANCH_POINT, MAIN_BRANCH, selection)
    else {
        return included;
    };

    while included.insert(cursor) {
        let kids = &tree.children[cursor];
        let current = &messages[cursor];
        match pick_child(messages, kids, &current.uuid, &current.branch.branch_id, selection) {
            Some(next) => cursor = next,
            None => break,
        }
    }

    included
}

/// Child to follow: the selected branch, else the continuation of `current_branch`,
/// else the first child.
fn pick_child(
    messages: &[Message],
    kids: &[usize],
    point_uuid: &str,
    current_branch: &str,
    selection: &BranchSelection,
) -> Option<usize> {
    match kids {
        [] => None,
        [only] => Some(*only),
        _ => {
            let find = |branch: &str| kids.iter().copied().find(|&k| messages[k].branch.branch_id == branch);

            if let Some(wanted) = selection.get(point_uuid) {
                if let Some(hit) = find(wanted.as_str()) {
                    return Some(hit);
                }
                logging::log_unknown_selection(point_uuid, wanted);
            }
            find(current_branch).or(Some(kids[0]))
        }
    }
}

/// Branch ids selectable at a branch point (or at [`ROOT_BRANCH_POINT`]), source order
pub fn available_branches(messages: &[Message], branch_point_uuid: &str) -> Vec<String> {
    let tree = MessageTree::build(messages);
    let kids: &[usize] = if branch_point_uuid == ROOT_BRANCH_POINT {
        &tree.roots
    } else {
        match messages.iter().position(|m| m.uuid == branch_point_uuid) {
            Some(idx) => &tree.children[idx],
            None => return Vec::new(),
        }
    };

    let mut ids: Vec<String> = Vec::new();
    for &k in kids {
        if !ids.contains(&messages[k].branch.branch_id) {
            ids.push(messages[k].branch.branch_id.clone());
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Sender;
    use crate::history::branches::{detect_branches, BranchPolicy};

    fn make_msg(uuid: &str, parent: Option<&str>) -> Message {
        Message::new(uuid, parent.map(String::from), Sender::Human, uuid)
    }

    fn make_annotated() -> Vec<Message> {
        let raw = vec![
            make_msg("h1", None),
            make_msg("a1", Some("h1")),
            make_msg("h2", Some("a1")),
            make_msg("a2", Some("h2")),
            make_msg("h2b", Some("a1")),
            make_msg("a2b", Some("h2b")),
            make_msg("a2b-alt", Some("h2b")),
            make_msg("h3b", Some("a2b-alt")),
        ];
        detect_branches(&raw, BranchPolicy::FirstCreated).into_messages()
    }

    fn uuids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(|m| m.uuid.as_str()).collect()
    }

    #[test]
    fn test_show_all_returns_everything() {
        let messages = make_annotated();
        let out = select_linear(&messages, &BranchSelection::new(), true);
        assert_eq!(out, messages);
    }

    #[test]
    fn test_default_selection_follows_main() {
        let messages = make_annotated();
        let out = select_linear(&messages, &BranchSelection::new(), false);
        assert_eq!(uuids(&out), vec!["h1", "a1", "h2", "a2"]);
    }

    #[test]
    fn test_selected_branch_and_nested_default() {
        let messages = make_annotated();
        let mut selection = BranchSelection::new();
        selection.insert("a1".into(), "branch-1".into());

        let out = select_linear(&messages, &selection, false);
        assert_eq!(uuids(&out), vec!["h1", "a1", "h2b", "a2b"]);

        let nested = messages.iter().find(|m| m.uuid == "a2b-alt").unwrap().branch.branch_id.clone();
        selection.insert("h2b".into(), nested);
        let out = select_linear(&messages, &selection, false);
        assert_eq!(uuids(&out), vec!["h1", "a1", "h2b", "a2b-alt", "h3b"]);
    }

    #[test]
    fn test_unknown_selection_falls_back() {
        let messages = make_annotated();
        let mut selection = BranchSelection::new();
        selection.insert("a1".into(), "branch-99".into());

        let out = select_linear(&messages, &selection, false);
        assert_eq!(uuids(&out), vec!["h1", "a1", "h2", "a2"]);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let messages = make_annotated();
        let mut selection = BranchSelection::new();
        selection.insert("a1".into(), "branch-1".into());

        let first = select_linear(&messages, &selection, false);
        let second = select_linear(&messages, &selection, false);
        assert_eq!(first, second);
    }

    #[test]
    fn test_root_selection() {
        let raw = vec![make_msg("h1", None), make_msg("e1", None), make_msg("a1", Some("e1"))];
        let messages = detect_branches(&raw, BranchPolicy::FirstCreated).into_messages();

        assert_eq!(available_branches(&messages, ROOT_BRANCH_POINT), vec!["main", "root-1"]);

        let mut selection = BranchSelection::new();
        selection.insert(ROOT_BRANCH_POINT.into(), "root-1".into());
        let out = select_linear(&messages, &selection, false);
        assert_eq!(uuids(&out), vec!["e1", "a1"]);
    }

    #[test]
    fn test_available_branches_at_point() {
        let messages = make_annotated();
        assert_eq!(available_branches(&messages, "a1"), vec!["main", "branch-1"]);
        assert!(available_branches(&messages, "nope").is_empty());
    }
}
