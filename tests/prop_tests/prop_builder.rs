use bson::{Bson, Document, oid::ObjectId};
use minq::{DbError, Minq, coerce_id};
use proptest::prelude::*;

fn fragment() -> impl Strategy<Value = Document> {
    proptest::collection::vec(("[a-e]", any::<i32>()), 0..4)
        .prop_map(|pairs| pairs.into_iter().map(|(k, v)| (k, Bson::Int32(v))).collect())
}

proptest! {
    // Chained filters equal the left-to-right shallow merge of their fragments.
    #[test]
    fn prop_filter_is_left_to_right_merge(fragments in proptest::collection::vec(fragment(), 0..6)) {
        let db = Minq::memory("prop");
        let mut expected = Document::new();
        let mut q = db.from("c");
        for f in &fragments {
            for (k, v) in f {
                expected.insert(k.clone(), v.clone());
            }
            q = q.filter(f.clone());
        }
        prop_assert_eq!(&q.spec().filter, &expected);
    }

    #[test]
    fn prop_clone_is_independent(base in fragment(), extra in fragment(), n in 1i64..100) {
        let q = Minq::memory("prop").from("c").filter(base.clone());
        let copy = q.clone();
        prop_assert_eq!(copy.spec(), q.spec());
        let copy = copy.filter(extra).limit(n);
        prop_assert_eq!(&q.spec().filter, &base);
        prop_assert_eq!(q.spec().limit(), None);
        prop_assert_eq!(copy.spec().limit(), Some(n));
    }

    #[test]
    fn prop_first_always_limits_to_one(limits in proptest::collection::vec(any::<i64>(), 0..4)) {
        let mut q = Minq::memory("prop").from("c");
        for n in limits {
            q = q.limit(n);
        }
        let q = q.first();
        prop_assert!(q.spec().first);
        prop_assert_eq!(q.spec().limit(), Some(1));
    }

    #[test]
    fn prop_limit_after_first_is_ignored(limits in proptest::collection::vec(any::<i64>(), 1..4)) {
        let mut q = Minq::memory("prop").from("c").first();
        for n in limits {
            q = q.limit(n);
        }
        prop_assert!(q.spec().first);
        prop_assert_eq!(q.spec().limit(), Some(1));
    }

    #[test]
    fn prop_non_arrays_are_build_errors(v in any::<i64>(), s in "[a-z]{0,8}") {
        for bad in [Bson::Int64(v), Bson::String(s.clone()), Bson::Document(bson::doc! { "k": v })] {
            let q = Minq::memory("prop").from("c").by_ids(bad);
            prop_assert!(matches!(q.error(), Some(DbError::Build(m)) if m.contains("array")));
        }
    }

    #[test]
    fn prop_coerce_id_hex_and_strings(bytes in any::<[u8; 12]>(), s in "[g-z0-9]{1,30}") {
        let oid = ObjectId::from_bytes(bytes);
        prop_assert_eq!(coerce_id(oid.to_hex()), Bson::ObjectId(oid));
        prop_assert_eq!(coerce_id(oid), Bson::ObjectId(oid));
        // strings containing a non-hex letter never become object ids
        let coerced = coerce_id(s.clone());
        if s.bytes().any(|b| b.is_ascii_alphabetic()) {
            prop_assert_eq!(coerced, Bson::String(s));
        }
    }

    #[test]
    fn prop_numbers_coerce_to_their_text(n in any::<i64>()) {
        prop_assert_eq!(coerce_id(n), Bson::String(n.to_string()));
    }
}
