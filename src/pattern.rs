use bson::{Bson, Document, doc};

/// Build a case-insensitive match expression for literal `text`, usable directly as a filter value:
///
/// ```
/// use bson::doc;
/// let q = doc! { "name": minq::like("c++") };
/// assert_eq!(q.get_document("name").unwrap().get_str("$regex").unwrap(), r"c\+\+");
/// ```
#[must_use]
pub fn like(text: &str) -> Bson {
    Bson::Document(doc! { "$regex": regex::escape(text), "$options": "i" })
}

/// Shallow merge: every key of `src` overwrites or is added to `dst`. Keys are never removed.
pub fn extend(dst: &mut Document, src: Document) {
    for (k, v) in src {
        dst.insert(k, v);
    }
}
