//! Topic tree traversal.
//!
//! Topics are stored as parent-pointer rows. A [`TopicForest`] is an index built
//! per request over one user's topics; every traversal is iterative and keeps a
//! visited set so that a cyclic parent chain left behind by old data cannot make
//! it loop forever.

use std::collections::{HashMap, HashSet};

use crate::models::Topic;

/// Parent/children index over the topics of a single user.
#[derive(Debug, Default, Clone)]
pub struct TopicForest {
    parents: HashMap<i64, Option<i64>>,
    children: HashMap<i64, Vec<i64>>,
}

impl TopicForest {
    /// Build the index from a user's topics.
    pub fn new<'a>(topics: impl IntoIterator<Item = &'a Topic>) -> Self {
        Self::from_links(topics.into_iter().map(|t| (t.id, t.parent_id)))
    }

    /// Build the index from `(id, parent_id)` pairs.
    pub fn from_links(links: impl IntoIterator<Item = (i64, Option<i64>)>) -> Self {
        let mut forest = Self::default();
        for (id, parent) in links {
            forest.parents.insert(id, parent);
        }
        forest.rebuild_children();
        forest
    }

    fn rebuild_children(&mut self) {
        self.children.clear();
        let mut ids: Vec<i64> = self.parents.keys().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(Some(parent)) = self.parents.get(&id) {
                self.children.entry(*parent).or_default().push(id);
            }
        }
    }

    pub fn parent_of(&self, id: i64) -> Option<i64> {
        self.parents.get(&id).copied().flatten()
    }

    /// The scope of `root`: `root` itself followed by every transitive
    /// descendant, each listed once, parents before their children.
    pub fn scope(&self, root: i64) -> Vec<i64> {
        let mut visited = HashSet::from([root]);
        let mut scope = vec![root];
        let mut stack = vec![root];

        while let Some(current) = stack.pop() {
            let Some(children) = self.children.get(&current) else {
                continue;
            };
            for &child in children {
                if visited.insert(child) {
                    scope.push(child);
                    stack.push(child);
                }
            }
        }

        scope
    }

    /// Order in which the subtree of `root` can be deleted: every descendant
    /// comes before its ancestors and `root` is last.
    pub fn deletion_order(&self, root: i64) -> Vec<i64> {
        let mut order = self.scope(root);
        order.reverse();
        order
    }

    /// Whether making `new_parent` the parent of `id` would close a loop.
    pub fn would_create_cycle(&self, id: i64, new_parent: Option<i64>) -> bool {
        match new_parent {
            None => false,
            Some(parent) => self.scope(id).contains(&parent),
        }
    }

    /// Re-point `id` at `parent`, keeping the children index consistent.
    pub fn set_parent(&mut self, id: i64, parent: Option<i64>) {
        if let Some(old) = self.parent_of(id) {
            if let Some(siblings) = self.children.get_mut(&old) {
                siblings.retain(|&c| c != id);
            }
        }
        self.parents.insert(id, parent);
        if let Some(parent) = parent {
            self.children.entry(parent).or_default().push(id);
        }
    }

    /// Whether following parent links upward from `id` ever revisits a topic.
    pub fn cycle_through(&self, id: i64) -> bool {
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                return true;
            }
            current = parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(id: i64, parent_id: Option<i64>) -> Topic {
        Topic {
            id,
            name: format!("t{}", id),
            parent_id,
            order: 0,
            user_id: 1,
        }
    }

    fn sample() -> TopicForest {
        // 1 ─┬─ 2 ── 4
        //    └─ 3
        // 5
        let topics = vec![
            topic(1, None),
            topic(2, Some(1)),
            topic(3, Some(1)),
            topic(4, Some(2)),
            topic(5, None),
        ];
        TopicForest::new(&topics)
    }

    fn sorted(mut ids: Vec<i64>) -> Vec<i64> {
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_scope_includes_root_and_descendants() {
        let forest = sample();
        assert_eq!(sorted(forest.scope(1)), vec![1, 2, 3, 4]);
        assert_eq!(sorted(forest.scope(2)), vec![2, 4]);
        assert_eq!(forest.scope(5), vec![5]);
        assert_eq!(forest.scope(1)[0], 1);
    }

    #[test]
    fn test_scope_of_unknown_root_is_just_the_root() {
        let forest = sample();
        assert_eq!(forest.scope(99), vec![99]);
    }

    #[test]
    fn test_scope_terminates_on_cycle() {
        let forest = TopicForest::from_links(vec![(1, Some(3)), (2, Some(1)), (3, Some(2))]);
        assert_eq!(sorted(forest.scope(1)), vec![1, 2, 3]);
        assert!(forest.cycle_through(2));
    }

    #[test]
    fn test_deletion_order_puts_descendants_first() {
        let forest = sample();
        let order = forest.deletion_order(1);
        assert_eq!(order.len(), 4);
        assert_eq!(*order.last().unwrap(), 1);

        let position = |id: i64| order.iter().position(|&x| x == id).unwrap();
        assert!(position(4) < position(2));
        assert!(position(2) < position(1));
        assert!(position(3) < position(1));
    }

    #[test]
    fn test_would_create_cycle() {
        let forest = sample();
        assert!(forest.would_create_cycle(1, Some(4)));
        assert!(forest.would_create_cycle(2, Some(2)));
        assert!(!forest.would_create_cycle(4, Some(3)));
        assert!(!forest.would_create_cycle(1, Some(5)));
        assert!(!forest.would_create_cycle(1, None));
    }

    #[test]
    fn test_set_parent_moves_subtree() {
        let mut forest = sample();
        forest.set_parent(2, Some(5));
        assert_eq!(sorted(forest.scope(5)), vec![2, 4, 5]);
        assert_eq!(sorted(forest.scope(1)), vec![1, 3]);
        assert!(!forest.cycle_through(4));

        forest.set_parent(5, Some(4));
        assert!(forest.cycle_through(5));
    }
}
