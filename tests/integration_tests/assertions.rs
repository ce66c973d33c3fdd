use super::_support::zoo;
use minq::{DbError, Outcome};
use bson::doc;

#[tokio::test]
async fn expect_passes_result_through_on_match() {
    let db = zoo().await;
    let out = db.from("bears").filter(doc! { "kind": "brown" }).expect(2).run().await.unwrap();
    assert_eq!(out.into_documents().unwrap().len(), 2);
}

#[tokio::test]
async fn expect_mentions_the_wanted_size() {
    let db = zoo().await;
    let err = db.from("bears").expect(3).run().await.unwrap_err();
    let DbError::AssertionFailure(msg) = &err else { panic!("unexpected error {err:?}") };
    assert!(msg.contains('3'));
    assert!(msg.contains('4'));
    assert!(err.to_string().starts_with("Assertion failure:"));
}

#[tokio::test]
async fn expect_applies_to_writes() {
    let db = zoo().await;
    let err = db
        .from("bears")
        .filter(doc! { "kind": "polar" })
        .expect(2)
        .remove()
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::AssertionFailure(_)));
    // the write itself went through
    assert_eq!(db.from("bears").count().run().await.unwrap(), Outcome::Count(3));
}

#[tokio::test]
async fn later_assertions_replace_earlier_ones() {
    let db = zoo().await;
    let out = db.from("bears").count().expect(99).assert(|o| matches!(o, Outcome::Count(4))).run().await;
    assert!(out.is_ok());
}

#[tokio::test]
async fn unnamed_predicates_are_described_by_type() {
    let db = zoo().await;
    let err = db.from("bears").exists().assert(|o| *o == Outcome::Exists(false)).run().await.unwrap_err();
    let DbError::AssertionFailure(msg) = err else { panic!("unexpected error") };
    assert!(msg.contains("closure"));
}
