//! Pure diffing of desired aggregate content against stored state.

use quill_model::PostMedia;
use uuid::Uuid;

/// Media plan for one update: rows to insert, rows whose position moved,
/// and row ids to remove. Rows are matched by object-store key, the stable
/// identity of an attachment.
#[derive(Debug, Default)]
pub struct MediaChanges {
    pub to_add: Vec<PostMedia>,
    pub to_reposition: Vec<PostMedia>,
    pub to_remove: Vec<Uuid>,
}

/// Compares stored media rows against the desired key list. Position in
/// `desired_keys` is the desired sort order; rows already at their desired
/// position are untouched.
pub fn diff_media(current: &[PostMedia], desired_keys: &[String], post_id: Uuid) -> MediaChanges {
    let mut changes = MediaChanges::default();

    for (idx, key) in desired_keys.iter().enumerate() {
        let sort_order = idx as i32;
        match current.iter().find(|m| &m.key == key) {
            None => changes.to_add.push(PostMedia {
                post_id,
                key: key.clone(),
                sort_order,
                ..PostMedia::default()
            }),
            Some(existing) if existing.sort_order != sort_order => {
                let mut moved = existing.clone();
                moved.sort_order = sort_order;
                changes.to_reposition.push(moved);
            }
            Some(_) => {}
        }
    }

    changes.to_remove = current
        .iter()
        .filter(|m| !desired_keys.contains(&m.key))
        .map(|m| m.id)
        .collect();

    changes
}

/// Tag delta for one update.
#[derive(Debug, Default, PartialEq)]
pub struct TagChanges {
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Set difference in both directions, preserving input order.
pub fn diff_tags(current: &[String], desired: &[String]) -> TagChanges {
    TagChanges {
        added: desired
            .iter()
            .filter(|t| !current.contains(t))
            .cloned()
            .collect(),
        removed: current
            .iter()
            .filter(|t| !desired.contains(t))
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(key: &str, sort_order: i32) -> PostMedia {
        PostMedia {
            id: Uuid::now_v7(),
            key: key.to_owned(),
            sort_order,
            ..PostMedia::default()
        }
    }

    fn keys(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn replacing_the_head_repositions_the_survivor_and_appends_the_new() {
        let a = media("a", 0);
        let b = media("b", 1);
        let post_id = Uuid::now_v7();

        let changes = diff_media(&[a.clone(), b.clone()], &keys(&["b", "c"]), post_id);

        assert_eq!(changes.to_add.len(), 1);
        assert_eq!(changes.to_add[0].key, "c");
        assert_eq!(changes.to_add[0].sort_order, 1);
        assert_eq!(changes.to_add[0].post_id, post_id);

        assert_eq!(changes.to_reposition.len(), 1);
        assert_eq!(changes.to_reposition[0].id, b.id);
        assert_eq!(changes.to_reposition[0].sort_order, 0);

        assert_eq!(changes.to_remove, vec![a.id]);
    }

    #[test]
    fn identical_media_set_is_a_full_no_op() {
        let a = media("a", 0);
        let b = media("b", 1);

        let changes = diff_media(&[a, b], &keys(&["a", "b"]), Uuid::now_v7());

        assert!(changes.to_add.is_empty());
        assert!(changes.to_reposition.is_empty());
        assert!(changes.to_remove.is_empty());
    }

    #[test]
    fn clearing_media_removes_every_row() {
        let a = media("a", 0);
        let b = media("b", 1);
        let ids = vec![a.id, b.id];

        let changes = diff_media(&[a, b], &[], Uuid::now_v7());

        assert!(changes.to_add.is_empty());
        assert_eq!(changes.to_remove, ids);
    }

    #[test]
    fn tag_diff_is_directional_and_leaves_the_intersection_alone() {
        let changes = diff_tags(&keys(&["old", "keep"]), &keys(&["keep", "new"]));
        assert_eq!(changes.added, keys(&["new"]));
        assert_eq!(changes.removed, keys(&["old"]));
    }

    #[test]
    fn tag_diff_of_equal_sets_is_empty() {
        let changes = diff_tags(&keys(&["a", "b"]), &keys(&["a", "b"]));
        assert_eq!(changes, TagChanges::default());
    }
}
