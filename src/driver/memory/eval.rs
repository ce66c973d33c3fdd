use bson::{Bson, Document};
use std::cmp::Ordering;

use super::types::{CmpOp, Filter, MAX_PATH_DEPTH, Order, Projection, SortSpec};

pub fn eval_filter(doc: &Document, filter: &Filter) -> bool {
    match filter {
        Filter::True => true,
        Filter::And(fs) => fs.iter().all(|f| eval_filter(doc, f)),
        Filter::Or(fs) => fs.iter().any(|f| eval_filter(doc, f)),
        Filter::Not(f) => !eval_filter(doc, f),
        Filter::Exists { path, exists } => get_path(doc, path).is_some() == *exists,
        Filter::In { path, values } => matches_any(get_path(doc, path), values),
        Filter::Nin { path, values } => !matches_any(get_path(doc, path), values),
        Filter::Cmp { path, op: CmpOp::Eq, value } => matches_eq(get_path(doc, path), value),
        Filter::Cmp { path, op, value } => get_path(doc, path).is_some_and(|v| {
            candidates(v).any(|c| {
                compare_same_class(c, value).is_some_and(|ord| match op {
                    CmpOp::Gt => ord == Ordering::Greater,
                    CmpOp::Gte => ord != Ordering::Less,
                    CmpOp::Lt => ord == Ordering::Less,
                    CmpOp::Lte => ord != Ordering::Greater,
                    CmpOp::Eq => ord == Ordering::Equal,
                })
            })
        }),
        Filter::Regex { path, re } => get_path(doc, path).is_some_and(|v| {
            candidates(v).any(|c| matches!(c, Bson::String(s) if re.is_match(s)))
        }),
    }
}

/// The value itself, then each element when it is an array.
fn candidates(v: &Bson) -> impl Iterator<Item = &Bson> {
    let elements: &[Bson] = match v {
        Bson::Array(items) => items.as_slice(),
        _ => &[],
    };
    std::iter::once(v).chain(elements)
}

/// Equality where a `null` operand also matches a missing field.
fn matches_eq(found: Option<&Bson>, wanted: &Bson) -> bool {
    match found {
        None => matches!(wanted, Bson::Null),
        Some(v) => candidates(v).any(|c| values_equal(c, wanted)),
    }
}

fn matches_any(found: Option<&Bson>, set: &[Bson]) -> bool {
    set.iter().any(|wanted| matches_eq(found, wanted))
}

#[allow(clippy::cast_precision_loss)]
fn as_number(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(i) => Some(f64::from(*i)),
        Bson::Int64(i) => Some(*i as f64),
        Bson::Double(f) => Some(*f),
        _ => None,
    }
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Ordering for range operators; values of different kinds never compare.
fn compare_same_class(a: &Bson, b: &Bson) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() {
        return None;
    }
    let mut segments = path.split('.');
    let mut cur = doc.get(segments.next()?)?;
    for (depth, seg) in segments.enumerate() {
        if depth >= MAX_PATH_DEPTH {
            return None;
        }
        cur = match cur {
            Bson::Document(d) => d.get(seg)?,
            _ => return None,
        };
    }
    Some(cur)
}

pub fn compare_docs(a: &Document, b: &Document, sort: &[SortSpec]) -> Ordering {
    for s in sort {
        let ord = match (get_path(a, &s.field), get_path(b, &s.field)) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return if s.order == Order::Asc { ord } else { ord.reverse() };
        }
    }
    Ordering::Equal
}

/// Total order over values used for sorting.
pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.total_cmp(&y);
    }
    compare_same_class(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

fn type_rank(v: &Bson) -> u8 {
    use bson::Bson as T;
    match v {
        T::MinKey => 0,
        T::Null | T::Undefined => 1,
        T::Int32(_) | T::Int64(_) | T::Double(_) | T::Decimal128(_) => 2,
        T::Symbol(_) | T::String(_) => 3,
        T::Document(_) => 4,
        T::Array(_) => 5,
        T::Binary(_) => 6,
        T::ObjectId(_) => 7,
        T::Boolean(_) => 8,
        T::DateTime(_) => 9,
        T::Timestamp(_) => 10,
        T::RegularExpression(_) => 11,
        T::DbPointer(_) => 12,
        T::JavaScriptCode(_) | T::JavaScriptCodeWithScope(_) => 13,
        T::MaxKey => 255,
    }
}

pub fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => doc.clone(),
        Projection::Include { fields, with_id } => {
            let mut out = Document::new();
            if *with_id && let Some(id) = doc.get("_id") {
                out.insert("_id", id.clone());
            }
            for f in fields {
                if let Some(v) = doc.get(f) {
                    out.insert(f.clone(), v.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            doc.iter()
                .filter(|(k, _)| !fields.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }
    }
}
