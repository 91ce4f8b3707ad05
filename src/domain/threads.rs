use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::domain::entities::{CommentRecord, Reaction};

/// A comment together with the replies reachable within the depth cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub record: CommentRecord,
    /// Zero for a root, `parent.depth + 1` otherwise.
    pub depth: u32,
    pub replies: Vec<ThreadNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_edit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_delete: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_disliked: Option<bool>,
}

impl ThreadNode {
    pub fn leaf(record: CommentRecord) -> Self {
        Self {
            record,
            depth: 0,
            replies: Vec::new(),
            can_edit: None,
            can_delete: None,
            is_liked: None,
            is_disliked: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    pub max_depth: u32,
    pub include_replies: bool,
}

#[derive(Debug, Clone, Copy)]
enum Link {
    Root,
    Parent(usize),
    Missing,
}

/// Build the reply forest for one fetched page of comments.
///
/// Roots keep the order they were fetched in, as do the replies under each parent. Depth is
/// relative to the fetched set: a reply whose parent is absent from `records` is not attached
/// anywhere, and neither is anything below it. A reply deeper than `max_depth` is dropped.
pub fn build_thread_tree(records: Vec<CommentRecord>, options: TreeOptions) -> Vec<ThreadNode> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(records.len());
    let mut slots: Vec<Option<ThreadNode>> = Vec::with_capacity(records.len());

    for record in records {
        if record.parent_id.as_deref() == Some(record.id.as_str()) {
            warn!(comment_id = %record.id, "Ignoring comment that names itself as parent");
            continue;
        }
        if index.contains_key(&record.id) {
            warn!(comment_id = %record.id, "Ignoring duplicate comment row");
            continue;
        }
        index.insert(record.id.clone(), slots.len());
        slots.push(Some(ThreadNode::leaf(record)));
    }

    let links: Vec<Link> = slots
        .iter()
        .map(|slot| match slot.as_ref().and_then(|node| node.record.parent_id.as_ref()) {
            None => Link::Root,
            Some(parent) => index
                .get(parent)
                .map_or(Link::Missing, |&position| Link::Parent(position)),
        })
        .collect();

    let roots: Vec<usize> = links
        .iter()
        .enumerate()
        .filter_map(|(position, link)| matches!(link, Link::Root).then_some(position))
        .collect();

    if !options.include_replies {
        return roots
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect();
    }

    let depths = resolve_depths(&links);
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); slots.len()];

    for (position, link) in links.iter().enumerate() {
        let Link::Parent(parent) = *link else {
            continue;
        };
        match depths[position] {
            Some(depth) if depth <= options.max_depth => {
                if let Some(node) = slots[position].as_mut() {
                    node.depth = depth;
                }
                children[parent].push(position);
            }
            Some(depth) => {
                trace!(depth, max_depth = options.max_depth, "Dropping reply beyond depth cap");
            }
            None => {}
        }
    }

    roots
        .into_iter()
        .filter_map(|position| assemble(position, &mut slots, &children))
        .collect()
}

/// Depth of every slot along its parent chain, or `None` when the chain never reaches a root
/// (missing parent or a cycle).
fn resolve_depths(links: &[Link]) -> Vec<Option<u32>> {
    let mut depths: Vec<Option<Option<u32>>> = vec![None; links.len()];
    let mut on_path = vec![false; links.len()];

    for start in 0..links.len() {
        let mut chain = Vec::new();
        let mut cursor = start;
        let mut anchor = loop {
            if let Some(known) = depths[cursor] {
                break known;
            }
            if on_path[cursor] {
                break None;
            }
            match links[cursor] {
                Link::Root => {
                    depths[cursor] = Some(Some(0));
                    break Some(0);
                }
                Link::Missing => {
                    depths[cursor] = Some(None);
                    break None;
                }
                Link::Parent(parent) => {
                    on_path[cursor] = true;
                    chain.push(cursor);
                    cursor = parent;
                }
            }
        };

        for &position in chain.iter().rev() {
            anchor = anchor.map(|depth| depth.saturating_add(1));
            depths[position] = Some(anchor);
            on_path[position] = false;
        }
    }

    depths.into_iter().map(Option::flatten).collect()
}

fn assemble(
    position: usize,
    slots: &mut [Option<ThreadNode>],
    children: &[Vec<usize>],
) -> Option<ThreadNode> {
    let mut node = slots[position].take()?;
    for &child in &children[position] {
        if let Some(reply) = assemble(child, slots, children) {
            node.replies.push(reply);
        }
    }
    Some(node)
}

/// Fill the viewer-relative flags on every node of the forest.
///
/// Records missing from `reactions` count as neither liked nor disliked.
pub fn annotate_for_viewer(
    nodes: &mut [ThreadNode],
    viewer_id: &str,
    reactions: &HashMap<String, Reaction>,
) {
    for node in nodes {
        let own = node.record.author_id == viewer_id;
        let reaction = reactions
            .get(&node.record.id)
            .copied()
            .unwrap_or_default();
        node.can_edit = Some(own);
        node.can_delete = Some(own);
        node.is_liked = Some(reaction.liked);
        node.is_disliked = Some(reaction.disliked);
        annotate_for_viewer(&mut node.replies, viewer_id, reactions);
    }
}

/// Ids of every node in the forest, depth first.
pub fn collect_ids(nodes: &[ThreadNode]) -> Vec<String> {
    let mut ids = Vec::new();
    let mut stack: Vec<&ThreadNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        ids.push(node.record.id.clone());
        stack.extend(node.replies.iter().rev());
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RecordStatus;
    use time::OffsetDateTime;

    fn record(id: &str, parent: Option<&str>) -> CommentRecord {
        CommentRecord {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            entity_type: "post".to_string(),
            entity_id: "1".to_string(),
            author_id: format!("author-{id}"),
            content: format!("comment {id}"),
            status: RecordStatus::Approved,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            is_edited: false,
            reply_count: 0,
        }
    }

    fn options(max_depth: u32) -> TreeOptions {
        TreeOptions {
            max_depth,
            include_replies: true,
        }
    }

    fn assert_depths(nodes: &[ThreadNode], expected: u32, max_depth: u32) {
        for node in nodes {
            assert_eq!(node.depth, expected, "node {}", node.record.id);
            assert!(node.depth <= max_depth);
            assert_depths(&node.replies, expected + 1, max_depth);
        }
    }

    #[test]
    fn depth_cap_drops_grandchildren() {
        let mut records: Vec<CommentRecord> = (1..=5)
            .map(|n| record(&format!("r{n}"), None))
            .collect();
        records.push(record("c1", Some("r1")));
        records.push(record("c2", Some("r1")));
        records.push(record("c3", Some("r1")));
        records.push(record("g1", Some("c1")));

        let tree = build_thread_tree(records, options(1));

        assert_eq!(tree.len(), 5);
        let first = &tree[0];
        assert_eq!(first.record.id, "r1");
        assert_eq!(first.replies.len(), 3);
        assert!(first.replies.iter().all(|reply| reply.replies.is_empty()));
        assert!(first.replies.iter().all(|reply| reply.depth == 1));
        assert_depths(&tree, 0, 1);
    }

    #[test]
    fn replies_fetched_before_parents_get_correct_depth() {
        let records = vec![
            record("g1", Some("c1")),
            record("c1", Some("r1")),
            record("r1", None),
        ];

        let tree = build_thread_tree(records, options(5));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].replies[0].record.id, "c1");
        assert_eq!(tree[0].replies[0].replies[0].record.id, "g1");
        assert_depths(&tree, 0, 5);
    }

    #[test]
    fn reply_order_follows_fetch_order() {
        let records = vec![
            record("r1", None),
            record("c3", Some("r1")),
            record("c1", Some("r1")),
            record("c2", Some("r1")),
        ];

        let tree = build_thread_tree(records, options(3));
        let ids: Vec<&str> = tree[0]
            .replies
            .iter()
            .map(|node| node.record.id.as_str())
            .collect();
        assert_eq!(ids, ["c3", "c1", "c2"]);
    }

    #[test]
    fn orphaned_replies_are_excluded() {
        let records = vec![
            record("r1", None),
            record("c1", Some("missing")),
            record("g1", Some("c1")),
        ];

        let tree = build_thread_tree(records, options(5));

        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn cycles_and_self_parents_are_ignored() {
        let records = vec![
            record("r1", None),
            record("a", Some("b")),
            record("b", Some("a")),
            record("s", Some("s")),
        ];

        let tree = build_thread_tree(records, options(5));

        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn replies_skipped_when_not_requested() {
        let records = vec![record("r1", None), record("c1", Some("r1"))];

        let tree = build_thread_tree(
            records,
            TreeOptions {
                max_depth: 3,
                include_replies: false,
            },
        );

        assert_eq!(tree.len(), 1);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn duplicate_rows_keep_first_occurrence() {
        let mut duplicate = record("r1", None);
        duplicate.content = "second copy".to_string();
        let records = vec![record("r1", None), duplicate];

        let tree = build_thread_tree(records, options(1));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].record.content, "comment r1");
    }

    #[test]
    fn viewer_flags_follow_authorship_and_reactions() {
        let mut own = record("r1", None);
        own.author_id = "viewer".to_string();
        let records = vec![own, record("c1", Some("r1"))];
        let mut tree = build_thread_tree(records, options(2));

        let mut reactions = HashMap::new();
        reactions.insert(
            "c1".to_string(),
            Reaction {
                liked: true,
                disliked: false,
            },
        );
        annotate_for_viewer(&mut tree, "viewer", &reactions);

        let root = &tree[0];
        assert_eq!(root.can_edit, Some(true));
        assert_eq!(root.can_delete, Some(true));
        assert_eq!(root.is_liked, Some(false));
        let reply = &root.replies[0];
        assert_eq!(reply.can_edit, Some(false));
        assert_eq!(reply.is_liked, Some(true));
        assert_eq!(reply.is_disliked, Some(false));
    }

    #[test]
    fn collect_ids_walks_depth_first() {
        let records = vec![
            record("r1", None),
            record("c1", Some("r1")),
            record("g1", Some("c1")),
            record("r2", None),
        ];
        let tree = build_thread_tree(records, options(3));

        assert_eq!(collect_ids(&tree), ["r1", "c1", "g1", "r2"]);
    }
}
