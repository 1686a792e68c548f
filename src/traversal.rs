/// Graph traversal helpers (spec §4.5): the recursion guard `save_all`/
/// `delete_all` need when a user model's tree contains a cycle.
///
/// The repository itself does not detect cycles — a `Transaction` that
/// lists itself as one of its own splits would otherwise recurse forever
/// through `save_related`. This tracks identity by id once a vertex has
/// been saved, and by its temporary address before that (spec.md §7's
/// "visited-set... by temporary tag until `id` is assigned, then by `id`").
use std::cell::RefCell;
use std::collections::HashSet;

use crate::model::Persistable;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum VisitKey {
    Unsaved(usize),
    Saved(&'static str, i64),
}

fn visit_key<T: Persistable>(obj: &T) -> VisitKey {
    match obj.id() {
        Some(id) => VisitKey::Saved(T::type_name(), id),
        None => VisitKey::Unsaved(obj as *const T as usize),
    }
}

/// The set of vertices currently being saved or deleted on this call stack.
#[derive(Default)]
pub(crate) struct VisitSet {
    active: RefCell<HashSet<VisitKey>>,
}

impl VisitSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }
}

/// Marks one vertex as "on stack" for the lifetime of the guard; removed on
/// drop so sibling subtrees (not ancestors) can still reach the same vertex.
pub(crate) struct VisitGuard<'a> {
    set: &'a VisitSet,
    key: VisitKey,
}

impl Drop for VisitGuard<'_> {
    fn drop(&mut self) {
        self.set.active.borrow_mut().remove(&self.key);
    }
}

/// Enter `obj` into `set`. Returns `None` if `obj` is already on the current
/// recursion stack — the caller should treat this as "already being saved
/// further up the call chain" and skip recursing into it again.
pub(crate) fn enter<'a, T: Persistable>(set: &'a VisitSet, obj: &T) -> Option<VisitGuard<'a>> {
    let key = visit_key(obj);
    if !set.active.borrow_mut().insert(key.clone()) {
        return None;
    }
    Some(VisitGuard { set, key })
}
