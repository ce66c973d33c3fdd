use crate::errors::DbError;
use bson::{Bson, Document};

use super::types::{
    CmpOp, Filter, MAX_IN_SET, MAX_PATH_DEPTH, MAX_SORT_FIELDS, Order, Projection, SortSpec,
    Update, UpdateDoc,
};

fn query_error(msg: impl Into<String>) -> DbError {
    DbError::QueryError(msg.into())
}

/// Compile a filter document.
///
/// # Errors
/// Returns `DbError::QueryError` for unknown operators or malformed operands.
pub fn parse_filter(doc: &Document) -> Result<Filter, DbError> {
    parse_level(doc, 0)
}

fn parse_level(doc: &Document, depth: usize) -> Result<Filter, DbError> {
    if depth > MAX_PATH_DEPTH {
        return Err(query_error("filter nested too deeply"));
    }
    let mut parts = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        let part = match key.as_str() {
            "$and" => Filter::And(sub_filters(key, value, depth)?),
            "$or" => Filter::Or(sub_filters(key, value, depth)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(sub_filters(key, value, depth)?))),
            op if op.starts_with('$') => {
                return Err(query_error(format!("unknown top-level operator {op}")));
            }
            path => parse_field(path, value)?,
        };
        parts.push(part);
    }
    Ok(all_of(parts))
}

fn all_of(mut parts: Vec<Filter>) -> Filter {
    match parts.len() {
        0 => Filter::True,
        1 => parts.pop().unwrap_or(Filter::True),
        _ => Filter::And(parts),
    }
}

fn sub_filters(op: &str, value: &Bson, depth: usize) -> Result<Vec<Filter>, DbError> {
    let Bson::Array(items) = value else {
        return Err(query_error(format!("{op} takes an array of filters")));
    };
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_level(d, depth + 1),
            _ => Err(query_error(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn parse_field(path: &str, value: &Bson) -> Result<Filter, DbError> {
    match value {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
            parse_operators(path, ops)
        }
        other => Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: other.clone() }),
    }
}

fn parse_operators(path: &str, ops: &Document) -> Result<Filter, DbError> {
    let regex_flags = ops.get_str("$options").unwrap_or("");
    let mut parts = Vec::with_capacity(ops.len());
    for (op, v) in ops {
        let cmp = |op| Filter::Cmp { path: path.to_string(), op, value: v.clone() };
        let part = match op.as_str() {
            "$eq" => cmp(CmpOp::Eq),
            "$ne" => Filter::Not(Box::new(cmp(CmpOp::Eq))),
            "$gt" => cmp(CmpOp::Gt),
            "$gte" => cmp(CmpOp::Gte),
            "$lt" => cmp(CmpOp::Lt),
            "$lte" => cmp(CmpOp::Lte),
            "$in" => Filter::In { path: path.to_string(), values: value_set(op, v)? },
            "$nin" => Filter::Nin { path: path.to_string(), values: value_set(op, v)? },
            "$exists" => Filter::Exists { path: path.to_string(), exists: truthy(v) },
            "$regex" => {
                let Bson::String(pattern) = v else {
                    return Err(query_error(format!("$regex on {path} must be a string")));
                };
                Filter::Regex { path: path.to_string(), re: compile_regex(pattern, regex_flags)? }
            }
            "$options" => continue,
            "$not" => match v {
                Bson::Document(inner) => Filter::Not(Box::new(parse_operators(path, inner)?)),
                _ => return Err(query_error(format!("$not on {path} takes an operator document"))),
            },
            other => return Err(query_error(format!("unknown operator {other} on {path}"))),
        };
        parts.push(part);
    }
    Ok(all_of(parts))
}

fn value_set(op: &str, v: &Bson) -> Result<Vec<Bson>, DbError> {
    match v {
        Bson::Array(values) if values.len() <= MAX_IN_SET => Ok(values.clone()),
        Bson::Array(values) => {
            Err(query_error(format!("{op} set too large: {} > {MAX_IN_SET}", values.len())))
        }
        _ => Err(query_error(format!("{op} takes an array"))),
    }
}

fn compile_regex(pattern: &str, flags: &str) -> Result<regex::Regex, DbError> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|e| query_error(format!("bad $regex {pattern:?}: {e}")))
}

pub(crate) fn truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

/// # Errors
/// Returns `DbError::QueryError` when a direction is not a number.
pub fn parse_sort(sort: &Document) -> Result<Vec<SortSpec>, DbError> {
    if sort.len() > MAX_SORT_FIELDS {
        log::warn!("sort spec too long: {} fields, using the first {MAX_SORT_FIELDS}", sort.len());
    }
    sort.iter()
        .take(MAX_SORT_FIELDS)
        .map(|(field, dir)| {
            let order = match crate::query::as_i64(dir) {
                Some(n) if n < 0 => Order::Desc,
                Some(_) => Order::Asc,
                None => return Err(query_error(format!("sort direction for {field} must be 1 or -1"))),
            };
            Ok(SortSpec { field: field.clone(), order })
        })
        .collect()
}

/// # Errors
/// Returns `DbError::QueryError` when operators and plain fields are mixed, an operator is
/// unknown, or `$inc` is given a non-number.
pub fn parse_update(change: &Document) -> Result<Update, DbError> {
    if !change.keys().any(|k| k.starts_with('$')) {
        return Ok(Update::Replace(change.clone()));
    }
    if change.keys().any(|k| !k.starts_with('$')) {
        return Err(query_error("cannot mix update operators and plain fields"));
    }
    let mut out = UpdateDoc::default();
    for (op, v) in change {
        let Bson::Document(fields) = v else {
            return Err(query_error(format!("{op} takes a document")));
        };
        match op.as_str() {
            "$set" => out.set.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
            "$inc" => {
                for (k, by) in fields {
                    if !matches!(by, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
                        return Err(query_error(format!("$inc on {k} requires a number")));
                    }
                    out.inc.push((k.clone(), by.clone()));
                }
            }
            "$unset" => out.unset.extend(fields.keys().cloned()),
            other => return Err(query_error(format!("unknown update operator {other}"))),
        }
    }
    Ok(Update::Operators(out))
}

/// # Errors
/// Returns `DbError::QueryError` when inclusion and exclusion are mixed.
pub fn parse_projection(projection: Option<&Document>) -> Result<Projection, DbError> {
    let Some(projection) = projection.filter(|p| !p.is_empty()) else {
        return Ok(Projection::All);
    };
    let mut include = Vec::new();
    let mut exclude = Vec::new();
    let mut with_id = true;
    for (field, flag) in projection {
        match (field.as_str(), truthy(flag)) {
            ("_id", keep) => with_id = keep,
            (_, true) => include.push(field.clone()),
            (_, false) => exclude.push(field.clone()),
        }
    }
    match (include.is_empty(), exclude.is_empty()) {
        (false, false) => Err(query_error("projection cannot mix inclusion and exclusion")),
        (false, true) => Ok(Projection::Include { fields: include, with_id }),
        (true, _) if !with_id => {
            exclude.push("_id".to_string());
            Ok(Projection::Exclude(exclude))
        }
        (true, false) => Ok(Projection::Exclude(exclude)),
        (true, true) => Ok(Projection::Include { fields: Vec::new(), with_id }),
    }
}
