//! Recursive rewrite/filter engine over record sequences
//!
//! Traversal is depth-first and post-order: every sequence-valued field of
//! a record is rewritten before the decision function sees the record
//! itself, and a field whose sequence comes back empty is removed from the
//! record entirely. Any array-valued field is a traversal candidate; there
//! is no fixed "children" slot.

use crate::record::Record;
use serde_json::Value;

/// Decision returned by the rewrite callback for one record.
#[derive(Debug, Clone)]
pub enum Action {
    /// Leave the record in place; replacements are inserted immediately
    /// after it.
    Keep(Vec<Record>),
    /// Remove the record and splice the replacements into its position.
    /// Replacements are taken verbatim and never re-offered to the
    /// callback within the same pass.
    Drop(Vec<Record>),
}

impl Action {
    /// Keep the record unchanged, adding nothing.
    pub fn keep() -> Self {
        Action::Keep(Vec::new())
    }

    /// Drop the record without replacement.
    pub fn drop() -> Self {
        Action::Drop(Vec::new())
    }
}

/// Rewrite an ordered sequence of root records with the given decision
/// function. The parent argument is `None` at the root.
pub fn rewrite_records<F>(records: &mut Vec<Value>, decide: &mut F)
where
    F: FnMut(&mut Record, Option<&Record>) -> Action,
{
    walk(records, decide, None);
}

fn walk<F>(sequence: &mut Vec<Value>, decide: &mut F, parent: Option<&Record>)
where
    F: FnMut(&mut Record, Option<&Record>) -> Action,
{
    let mut i = 0;
    while i < sequence.len() {
        let action = match sequence[i].as_object_mut() {
            Some(record) => {
                rewrite_children(record, decide);
                decide(record, parent)
            }
            None => {
                // Sequences hold records by contract; anything else passes
                // through untouched.
                i += 1;
                continue;
            }
        };

        match action {
            Action::Keep(replacements) => {
                let added = replacements.len();
                sequence.splice(i + 1..i + 1, replacements.into_iter().map(Value::Object));
                i += 1 + added;
            }
            Action::Drop(replacements) => {
                let added = replacements.len();
                sequence.splice(i..i + 1, replacements.into_iter().map(Value::Object));
                i += added;
            }
        }
    }
}

/// Rewrite every sequence-valued field of a record, pruning fields whose
/// sequence ends up empty. The field under rewrite is detached from the
/// record for the duration, so the callback sees the parent without it.
fn rewrite_children<F>(record: &mut Record, decide: &mut F)
where
    F: FnMut(&mut Record, Option<&Record>) -> Action,
{
    let fields: Vec<String> = record.keys().cloned().collect();
    for field in fields {
        let mut detached = match record.get_mut(&field) {
            Some(slot) if slot.is_array() => slot.take(),
            _ => continue,
        };
        if let Value::Array(children) = &mut detached {
            walk(children, decide, Some(&*record));
        }

        let now_empty = detached.as_array().map_or(true, Vec::is_empty);
        if now_empty {
            record.shift_remove(&field);
        } else if let Some(slot) = record.get_mut(&field) {
            *slot = detached;
        }
    }
}
