//! Recursive identifier remapping
//!
//! Rewrites identifier-bearing fields of a record tree in place against
//! the current identifier map. Values with no mapping are left unchanged,
//! so records referencing parents issued later in the log pass through
//! untouched on first sight.
//!
//! The per-record step order is load-bearing: incoming-link aliasing runs
//! last so it observes the substitutions made by the earlier steps.

use crate::idmap::IdMap;
use crate::record::{self, Record};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Per-record-type aliasing: old alias field name to new field name.
pub type IncomingLinks = BTreeMap<String, BTreeMap<String, String>>;

/// Remap every identifier-bearing field in an ordered sequence of records.
///
/// `exclude` lists field names exempted from the `*_id` rule.
pub fn remap_records(
    records: &mut [Value],
    map: &IdMap,
    links: &IncomingLinks,
    exclude: &HashSet<String>,
) {
    for value in records.iter_mut() {
        let Some(rec) = value.as_object_mut() else {
            continue;
        };
        remap_record(rec, map, links, exclude);
    }
}

fn remap_record(rec: &mut Record, map: &IdMap, links: &IncomingLinks, exclude: &HashSet<String>) {
    // 1. A record without a type is suspicious but not fatal.
    let record_type = rec.get("type").and_then(Value::as_str).map(str::to_owned);
    if record_type.is_none() {
        tracing::warn!(record = %record::preview(rec), "could not determine record type");
    }

    // 2. Own identifier.
    if let Some(v) = rec.get_mut("id") {
        if let Some((from, to)) = map.substitute(v) {
            tracing::debug!("mapped {} to {}", from, to);
        }
    }

    // 3. Issuing user.
    if let Some(v) = rec.get_mut("user") {
        if let Some((from, to)) = map.substitute(v) {
            tracing::debug!("mapped {} to {} (user)", from, to);
        }
    }

    // 4. Every *_id field outside the exclusion set.
    let id_fields: Vec<String> = rec
        .keys()
        .filter(|k| k.ends_with("_id") && !exclude.contains(*k))
        .cloned()
        .collect();
    for field in id_fields {
        if let Some(v) = rec.get_mut(&field) {
            if let Some((from, to)) = map.substitute(v) {
                tracing::debug!("mapped {} to {} ({})", from, to, field);
            }
        }
    }

    // 5. Adoption/disownment sets: every identifier in every set.
    for field in ["_adopt", "_disown"] {
        if let Some(Value::Object(sets)) = rec.get_mut(field) {
            for (_, members) in sets.iter_mut() {
                let Value::Array(ids) = members else { continue };
                for id in ids.iter_mut() {
                    if let Some((from, to)) = map.substitute(id) {
                        tracing::debug!("mapped {} to {} ({})", from, to, field);
                    }
                }
            }
        }
    }

    // 6. Recurse into every sequence-valued field.
    let fields: Vec<String> = rec.keys().cloned().collect();
    for field in fields {
        if let Some(Value::Array(children)) = rec.get_mut(&field) {
            remap_records(children, map, links, exclude);
        }
    }

    // 7. Incoming-link aliasing for this record's type, reading fields as
    // mutated by the steps above.
    let Some(record_type) = record_type else { return };
    let Some(aliases) = links.get(&record_type) else { return };
    for (old_alias, new_alias) in aliases {
        let Some(source) = rec.get(old_alias) else { continue };
        if !record::non_empty(source) {
            continue;
        }
        let mut aliased = source.clone();
        if let Some((from, to)) = map.substitute(&mut aliased) {
            tracing::debug!("mapped {} to {} ({} -> {})", from, to, old_alias, new_alias);
        }
        rec.insert(new_alias.clone(), aliased);
    }
}
