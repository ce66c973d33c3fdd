//! Identifier coercion used by `Query::by_id` and `Query::by_ids`.

use bson::Bson;
use bson::oid::ObjectId;

/// Returns true when `s` looks like a hex-encoded object id (exactly 24 hex digits, any case).
#[must_use]
pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Coerce an arbitrary id value into what the store expects.
///
/// Native object ids pass through. Anything else is stringified; a string that looks like
/// an object id becomes one, every other string is returned as-is.
#[must_use]
pub fn coerce_id(id: impl Into<Bson>) -> Bson {
    let id = id.into();
    if let Bson::ObjectId(_) = id {
        return id;
    }
    let s = stringify(&id);
    if is_object_id(&s)
        && let Ok(oid) = ObjectId::parse_str(&s)
    {
        return Bson::ObjectId(oid);
    }
    Bson::String(s)
}

fn stringify(v: &Bson) -> String {
    match v {
        Bson::String(s) => s.clone(),
        Bson::Int32(i) => i.to_string(),
        Bson::Int64(i) => i.to_string(),
        Bson::Double(f) => f.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::Null => "null".to_string(),
        other => other.to_string(),
    }
}
