//! Stable row identity for arrays and per-node instance state.
//!
//! Every rendered array owns an [`ArrayKeyTracker`]. Keys follow their row
//! through moves, inserts and removals; a row created by an operation has
//! no key until the tracker is synced after the next render. Instance state
//! (trackers, combinator selections, typed number text) is addressed by a
//! [`StateKey`]: the data path with array positions replaced by row keys,
//! so it travels with reordered rows.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::PathSegment;

/// Opaque identity of one array row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(u64);

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// A row with its key (absent for rows not yet synced).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedRow {
    pub key: Option<RowKey>,
    pub item: Value,
}

/// Structural edits of an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ArrayOp {
    Append { item: Value },
    Insert { index: usize, item: Value },
    Remove { index: usize },
    /// Move the row at `from` so it ends up at `to`.
    Move { from: usize, to: usize },
    MoveUp { index: usize },
    MoveDown { index: usize },
    /// Duplicate the row at `index` right after it.
    Copy { index: usize },
}

impl ArrayOp {
    /// Apply the edit to any row representation. `fresh` builds a row for a
    /// new item and `duplicate` a copy of an existing one. Out of range
    /// positions leave `rows` untouched; insert positions are clamped.
    pub fn apply_with<T, F, D>(&self, rows: &mut Vec<T>, fresh: F, duplicate: D)
    where
        F: FnOnce(Value) -> T,
        D: FnOnce(&T) -> T,
    {
        let len = rows.len();
        match self {
            ArrayOp::Append { item } => rows.push(fresh(item.clone())),
            ArrayOp::Insert { index, item } => rows.insert((*index).min(len), fresh(item.clone())),
            ArrayOp::Remove { index } => {
                if *index < len {
                    rows.remove(*index);
                }
            }
            ArrayOp::Move { from, to } => {
                if *from < len {
                    let row = rows.remove(*from);
                    rows.insert((*to).min(len - 1), row);
                }
            }
            ArrayOp::MoveUp { index } => {
                if *index > 0 && *index < len {
                    rows.swap(index - 1, *index);
                }
            }
            ArrayOp::MoveDown { index } => {
                if index + 1 < len {
                    rows.swap(*index, index + 1);
                }
            }
            ArrayOp::Copy { index } => {
                if *index < len {
                    let copy = duplicate(&rows[*index]);
                    rows.insert(index + 1, copy);
                }
            }
        }
    }

    /// The edit applied to plain items.
    pub fn apply(&self, items: &[Value]) -> Vec<Value> {
        let mut rows = items.to_vec();
        self.apply_with(&mut rows, |item| item, Value::clone);
        rows
    }
}

/// Carry keys from `previous` over to `next`.
///
/// With an operation, keys follow their rows and new or copied rows get no
/// key. Without one (an external data change), positions keep their keys,
/// extra rows get none and keys past the end are dropped.
pub fn reconcile_keys(previous: &[KeyedRow], next: &[Value], op: Option<&ArrayOp>) -> Vec<KeyedRow> {
    let mut keys: Vec<Option<RowKey>> = previous.iter().map(|row| row.key).collect();
    if let Some(op) = op {
        op.apply_with(&mut keys, |_| None, |_| None);
    }
    next.iter()
        .enumerate()
        .map(|(i, item)| KeyedRow {
            key: keys.get(i).copied().flatten(),
            item: item.clone(),
        })
        .collect()
}

/// Row keys of one array node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayKeyTracker {
    keys: Vec<Option<RowKey>>,
    next: u64,
}

impl ArrayKeyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[Option<RowKey>] {
        &self.keys
    }

    pub fn key(&self, index: usize) -> Option<RowKey> {
        self.keys.get(index).copied().flatten()
    }

    /// Record an edit; rows it creates stay keyless.
    pub fn apply(&mut self, op: &ArrayOp) {
        op.apply_with(&mut self.keys, |_| None, |_| None);
    }

    /// Fit the tracker to `len` rows and key every keyless row.
    pub fn sync(&mut self, len: usize) {
        self.keys.resize(len, None);
        for slot in &mut self.keys {
            if slot.is_none() {
                *slot = Some(RowKey(self.next));
                self.next += 1;
            }
        }
    }

    /// Pair the tracked keys with `items`.
    pub fn rows(&self, items: &[Value]) -> Vec<KeyedRow> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| KeyedRow {
                key: self.key(i),
                item: item.clone(),
            })
            .collect()
    }
}

/// One step of a [`StateKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StateSegment {
    Key(String),
    /// A keyed array row.
    Row(RowKey),
    /// An array row that has no key yet.
    Slot(usize),
}

pub type StateKey = Vec<StateSegment>;

/// Combinator selections are addressed by node and by how many combinators
/// deep they sit at that node.
pub type SelectionKey = (StateKey, usize);

/// What a render pass touched, used to sync and prune [`InstanceState`].
#[derive(Debug, Clone, Default)]
pub struct Visits {
    pub arrays: Vec<(StateKey, usize)>,
    pub selections: Vec<(SelectionKey, usize)>,
    pub nodes: BTreeSet<StateKey>,
}

/// State a form instance keeps between render passes.
#[derive(Debug, Clone, Default)]
pub struct InstanceState {
    trackers: BTreeMap<StateKey, ArrayKeyTracker>,
    selections: BTreeMap<SelectionKey, usize>,
    number_text: BTreeMap<StateKey, String>,
}

impl InstanceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a data path to its state key.
    pub fn state_key(&self, path: &[PathSegment]) -> StateKey {
        let mut key: StateKey = Vec::with_capacity(path.len());
        for segment in path {
            let next = match segment {
                PathSegment::Index(i) => self.row_segment(&key, *i),
                PathSegment::Key(k) => StateSegment::Key(k.clone()),
            };
            key.push(next);
        }
        key
    }

    /// The segment for row `index` of the array at `array`.
    pub fn row_segment(&self, array: &StateKey, index: usize) -> StateSegment {
        match self.trackers.get(array).and_then(|t| t.key(index)) {
            Some(key) => StateSegment::Row(key),
            None => StateSegment::Slot(index),
        }
    }

    pub fn tracker(&self, array: &StateKey) -> Option<&ArrayKeyTracker> {
        self.trackers.get(array)
    }

    pub fn row_key(&self, array: &StateKey, index: usize) -> Option<RowKey> {
        self.trackers.get(array).and_then(|t| t.key(index))
    }

    pub fn apply_array_op(&mut self, array: StateKey, op: &ArrayOp) {
        self.trackers.entry(array).or_default().apply(op);
    }

    pub fn selection(&self, key: &SelectionKey) -> Option<usize> {
        self.selections.get(key).copied()
    }

    pub fn select(&mut self, key: SelectionKey, index: usize) {
        self.selections.insert(key, index);
    }

    pub fn number_text(&self, key: &StateKey) -> Option<&str> {
        self.number_text.get(key).map(String::as_str)
    }

    pub fn set_number_text(&mut self, key: StateKey, text: String) {
        self.number_text.insert(key, text);
    }

    pub fn clear_number_text(&mut self, key: &StateKey) {
        self.number_text.remove(key);
    }

    /// Sync the trackers of visited arrays and drop state for every node
    /// the render pass did not reach. Rows keyed by this pass take over
    /// the state recorded under their slot.
    pub fn finish_render(&mut self, visits: Visits) {
        let mut live_arrays = BTreeSet::new();
        for (array, len) in visits.arrays {
            let array = self.rekey(&array);
            self.trackers.entry(array.clone()).or_default().sync(len);
            live_arrays.insert(array);
        }
        for ((key, depth), selected) in visits.selections {
            let key = (self.rekey(&key), depth);
            self.selections.entry(key).or_insert(selected);
        }
        let nodes: BTreeSet<StateKey> = visits.nodes.iter().map(|key| self.rekey(key)).collect();
        let number_text = std::mem::take(&mut self.number_text);
        self.number_text = number_text
            .into_iter()
            .map(|(key, text)| (self.rekey(&key), text))
            .filter(|(key, _)| nodes.contains(key))
            .collect();

        self.trackers.retain(|key, _| live_arrays.contains(key));
        self.selections.retain(|(key, _), _| nodes.contains(key));
    }

    /// Replace slots that have been given a row key since `key` was built.
    fn rekey(&self, key: &StateKey) -> StateKey {
        let mut rekeyed: StateKey = Vec::with_capacity(key.len());
        for segment in key {
            let next = match segment {
                StateSegment::Slot(index) => self.row_segment(&rekeyed, *index),
                other => other.clone(),
            };
            rekeyed.push(next);
        }
        rekeyed
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.trackers.clear();
        self.selections.clear();
        self.number_text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn synced(len: usize) -> ArrayKeyTracker {
        let mut tracker = ArrayKeyTracker::new();
        tracker.sync(len);
        tracker
    }

    #[test]
    fn key_travels_with_moved_row() {
        let mut tracker = synced(3);
        let before: Vec<RowKey> = tracker.keys().iter().flatten().copied().collect();
        tracker.apply(&ArrayOp::MoveDown { index: 0 });
        assert_eq!(
            tracker.keys(),
            &[Some(before[1]), Some(before[0]), Some(before[2])]
        );

        let data = ArrayOp::MoveDown { index: 0 }.apply(&[json!("foo"), json!("bar"), json!("baz")]);
        assert_eq!(data, vec![json!("bar"), json!("foo"), json!("baz")]);
    }

    #[test]
    fn insert_keeps_other_keys_and_new_row_is_keyless() {
        let mut tracker = synced(3);
        let before = tracker.keys().to_vec();
        tracker.apply(&ArrayOp::Insert { index: 1, item: json!("new") });
        assert_eq!(tracker.keys(), &[before[0], None, before[1], before[2]]);

        tracker.sync(4);
        assert!(tracker.keys().iter().all(Option::is_some));
        let mut distinct = tracker.keys().to_vec();
        distinct.dedup();
        assert_eq!(distinct.len(), 4);
    }

    #[test]
    fn remove_discards_only_that_key() {
        let mut tracker = synced(3);
        let before = tracker.keys().to_vec();
        tracker.apply(&ArrayOp::Remove { index: 1 });
        assert_eq!(tracker.keys(), &[before[0], before[2]]);
    }

    #[test]
    fn move_to_arbitrary_index() {
        let mut tracker = synced(4);
        let k = tracker.keys().to_vec();
        tracker.apply(&ArrayOp::Move { from: 0, to: 2 });
        assert_eq!(tracker.keys(), &[k[1], k[2], k[0], k[3]]);
        tracker.apply(&ArrayOp::Move { from: 3, to: 0 });
        assert_eq!(tracker.keys(), &[k[3], k[1], k[2], k[0]]);
    }

    #[test]
    fn copy_inserts_keyless_duplicate() {
        let data = ArrayOp::Copy { index: 0 }.apply(&[json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(data, vec![json!({"a": 1}), json!({"a": 1}), json!({"a": 2})]);
        let mut tracker = synced(2);
        let k = tracker.keys().to_vec();
        tracker.apply(&ArrayOp::Copy { index: 0 });
        assert_eq!(tracker.keys(), &[k[0], None, k[1]]);
    }

    #[test]
    fn reconcile_with_and_without_operation() {
        let mut tracker = synced(3);
        let previous = tracker.rows(&[json!("foo"), json!("bar"), json!("baz")]);
        let k: Vec<Option<RowKey>> = previous.iter().map(|r| r.key).collect();

        let next = vec![json!("foo"), json!("baz"), json!("qux")];
        let rows = reconcile_keys(&previous, &next, None);
        assert_eq!(rows.iter().map(|r| r.key).collect::<Vec<_>>(), vec![k[0], k[1], k[2]]);

        let next = vec![json!("foo"), json!("baz")];
        let rows = reconcile_keys(&previous, &next, Some(&ArrayOp::Remove { index: 1 }));
        assert_eq!(rows.iter().map(|r| r.key).collect::<Vec<_>>(), vec![k[0], k[2]]);

        let next = vec![json!("foo"), json!("bar"), json!("baz"), json!("new")];
        let rows = reconcile_keys(&previous, &next, Some(&ArrayOp::Append { item: json!("new") }));
        assert_eq!(rows[3].key, None);
        assert_eq!(rows[3].item, json!("new"));

        tracker.apply(&ArrayOp::Append { item: json!("new") });
        assert_eq!(tracker.keys().len(), 4);
    }

    #[test]
    fn out_of_range_operations_are_ignored() {
        let items = vec![json!(1), json!(2)];
        assert_eq!(ArrayOp::Remove { index: 5 }.apply(&items), items);
        assert_eq!(ArrayOp::MoveUp { index: 0 }.apply(&items), items);
        assert_eq!(ArrayOp::MoveDown { index: 1 }.apply(&items), items);
        assert_eq!(
            ArrayOp::Insert { index: 9, item: json!(3) }.apply(&items),
            vec![json!(1), json!(2), json!(3)]
        );
    }

    #[test]
    fn state_keys_follow_rows() {
        let mut state = InstanceState::new();
        let list: StateKey = vec![StateSegment::Key("list".into())];
        let mut visits = Visits::default();
        visits.arrays.push((list.clone(), 2));
        visits.nodes.insert(list.clone());
        state.finish_render(visits);

        let path = vec![PathSegment::from("list"), 1.into(), "name".into()];
        let before = state.state_key(&path);
        assert!(matches!(before[1], StateSegment::Row(_)));

        state.apply_array_op(list.clone(), &ArrayOp::MoveUp { index: 1 });
        let moved = vec![PathSegment::from("list"), 0.into(), "name".into()];
        assert_eq!(state.state_key(&moved), before);

        state.apply_array_op(list, &ArrayOp::Insert { index: 0, item: json!({}) });
        let fresh = vec![PathSegment::from("list"), 0.into()];
        assert_eq!(state.state_key(&fresh)[1], StateSegment::Slot(0));
    }

    #[test]
    fn finish_render_prunes_unvisited_state() {
        let mut state = InstanceState::new();
        let a: StateKey = vec![StateSegment::Key("a".into())];
        let b: StateKey = vec![StateSegment::Key("b".into())];
        state.select((a.clone(), 0), 1);
        state.set_number_text(b.clone(), "2.".into());

        let mut visits = Visits::default();
        visits.nodes.insert(a.clone());
        state.finish_render(visits);
        assert_eq!(state.selection(&(a, 0)), Some(1));
        assert_eq!(state.number_text(&b), None);
    }

    #[test]
    fn first_render_selection_moves_to_row_key() {
        let mut state = InstanceState::new();
        let list: StateKey = vec![StateSegment::Key("list".into())];
        let slot: StateKey = vec![StateSegment::Key("list".into()), StateSegment::Slot(0)];

        let mut visits = Visits::default();
        visits.arrays.push((list.clone(), 1));
        visits.selections.push(((slot.clone(), 0), 1));
        visits.nodes.insert(list);
        visits.nodes.insert(slot);
        state.finish_render(visits);

        let row = state.state_key(&[PathSegment::from("list"), 0.into()]);
        assert!(matches!(row[1], StateSegment::Row(_)));
        assert_eq!(state.selection(&(row, 0)), Some(1));
    }
}
