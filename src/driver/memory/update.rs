use crate::errors::DbError;
use bson::{Bson, Document};

use super::eval::get_path;
use super::types::{Update, UpdateDoc};

/// Apply `update` in place. Returns whether the document changed.
///
/// # Errors
/// Returns `DbError::QueryError` when `$inc` targets a non-numeric value.
pub fn apply_update(doc: &mut Document, update: &Update) -> Result<bool, DbError> {
    match update {
        Update::Replace(replacement) => {
            let mut out = Document::new();
            if let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            for (k, v) in replacement {
                if k != "_id" {
                    out.insert(k.clone(), v.clone());
                }
            }
            let changed = out != *doc;
            *doc = out;
            Ok(changed)
        }
        Update::Operators(ops) => apply_operators(doc, ops),
    }
}

fn apply_operators(doc: &mut Document, ops: &UpdateDoc) -> Result<bool, DbError> {
    let mut changed = false;
    for (path, value) in &ops.set {
        changed |= set_path(doc, path, value.clone());
    }
    for (path, by) in &ops.inc {
        let sum = add(get_path(doc, path), by).ok_or_else(|| {
            DbError::QueryError(format!("cannot apply $inc to non-numeric field {path}"))
        })?;
        changed |= set_path(doc, path, sum);
    }
    for path in &ops.unset {
        changed |= unset_path(doc, path);
    }
    Ok(changed)
}

/// Integer widths are kept unless the sum overflows them; any double makes a double.
fn add(current: Option<&Bson>, by: &Bson) -> Option<Bson> {
    let zero = Bson::Int32(0);
    match (current.unwrap_or(&zero), by) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b).map_or_else(|| Bson::Int64(i64::from(*a) + i64::from(*b)), Bson::Int32),
        ),
        (Bson::Int32(a), Bson::Int64(b)) => Some(Bson::Int64(i64::from(*a).saturating_add(*b))),
        (Bson::Int64(a), Bson::Int32(b)) => Some(Bson::Int64(a.saturating_add(i64::from(*b)))),
        (Bson::Int64(a), Bson::Int64(b)) => Some(Bson::Int64(a.saturating_add(*b))),
        (a, b) => Some(Bson::Double(as_f64(a)? + as_f64(b)?)),
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

/// Set a dotted path, creating intermediate documents as needed.
pub fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    match path.split_once('.') {
        None => root.insert(path, value.clone()) != Some(value),
        Some((head, rest)) => {
            if !matches!(root.get(head), Some(Bson::Document(_))) {
                root.insert(head, Document::new());
            }
            match root.get_mut(head) {
                Some(Bson::Document(child)) => set_path(child, rest, value),
                _ => false,
            }
        }
    }
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => root.remove(path).is_some(),
        Some((head, rest)) => match root.get_mut(head) {
            Some(Bson::Document(child)) => unset_path(child, rest),
            _ => false,
        },
    }
}

/// Starting document for an upsert: the filter's plain equality fields.
pub fn seed_from_filter(filter: &Document) -> Document {
    let mut seed = Document::new();
    for (k, v) in filter {
        if k.starts_with('$') {
            continue;
        }
        if let Bson::Document(d) = v
            && d.keys().next().is_some_and(|op| op.starts_with('$'))
        {
            if let Some(eq) = d.get("$eq") {
                set_path(&mut seed, k, eq.clone());
            }
            continue;
        }
        set_path(&mut seed, k, v.clone());
    }
    seed
}
