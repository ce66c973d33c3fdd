use super::_support::{names, zoo};
use bson::{Bson, doc};
use minq::types::{DeleteReport, UpdateReport};
use minq::{DbError, Minq, Outcome};

#[tokio::test]
async fn update_touches_first_match_unless_multi() {
    let db = zoo().await;
    let one = db.from("bears").filter(doc! { "kind": "brown" }).update(doc! { "$set": { "fed": true } }).await.unwrap();
    assert_eq!(one, Outcome::Updated(UpdateReport { matched: 1, modified: 1, upserted_id: None }));

    let all = db
        .from("bears")
        .filter(doc! { "kind": "brown" })
        .options(doc! { "multi": true })
        .update(doc! { "$inc": { "age": 1 } })
        .await
        .unwrap();
    assert_eq!(all.quantity(), 2);
    let fed = db.from("bears").filter(doc! { "fed": true }).count().run().await.unwrap();
    assert_eq!(fed, Outcome::Count(1));
}

#[tokio::test]
async fn update_moves_payload_id_into_filter() {
    let db = zoo().await;
    let yogi = db.from("bears").filter(doc! { "name": "yogi" }).first().run().await.unwrap();
    let id = yogi.into_document().unwrap().unwrap().get("_id").cloned().unwrap();

    let out = db.from("bears").update(doc! { "_id": id.clone(), "$set": { "age": 31 } }).await.unwrap();
    assert_eq!(out.quantity(), 1);
    let yogi = db.from("bears").by_id(id).run().await.unwrap().into_document().unwrap().unwrap();
    assert_eq!(yogi.get_i32("age").unwrap(), 31);
}

#[tokio::test]
async fn upsert_inserts_from_filter_when_nothing_matches() {
    let db = zoo().await;
    let out = db
        .from("bears")
        .filter(doc! { "name": "smokey", "age": { "$gt": 1 } })
        .upsert(doc! { "$set": { "kind": "black" } })
        .await
        .unwrap();
    let Outcome::Updated(report) = out else { panic!("unexpected outcome") };
    assert_eq!(report.matched, 0);
    assert!(report.upserted_id.is_some());

    let smokey = db.from("bears").filter(doc! { "name": "smokey" }).first().run().await.unwrap();
    let smokey = smokey.into_document().unwrap().unwrap();
    assert_eq!(smokey.get_str("kind").unwrap(), "black");
    assert!(smokey.get("age").is_none());

    let again = db.from("bears").filter(doc! { "name": "smokey" }).upsert(doc! { "$set": { "kind": "brown" } }).await.unwrap();
    assert_eq!(again, Outcome::Updated(UpdateReport { matched: 1, modified: 1, upserted_id: None }));
}

#[tokio::test]
async fn find_and_modify_returns_old_and_modify_and_find_new() {
    let db = zoo().await;
    let before = db
        .from("bears")
        .filter(doc! { "name": "iorek" })
        .find_and_modify(doc! { "$inc": { "age": 1 } })
        .await
        .unwrap()
        .into_document()
        .unwrap()
        .unwrap();
    assert_eq!(before.get_i32("age").unwrap(), 40);

    let after = db
        .from("bears")
        .filter(doc! { "name": "iorek" })
        .modify_and_find(doc! { "$inc": { "age": 1 } })
        .await
        .unwrap()
        .into_document()
        .unwrap()
        .unwrap();
    assert_eq!(after.get_i32("age").unwrap(), 42);

    let none = db.from("bears").filter(doc! { "name": "nobody" }).modify_and_find(doc! { "$set": { "x": 1 } }).await.unwrap();
    assert_eq!(none, Outcome::Found(None));
}

#[tokio::test]
async fn find_and_modify_picks_lowest_id_by_default() {
    let db = Minq::memory("zoo");
    db.from("bears").insert(vec![doc! { "_id": 3, "n": "c" }, doc! { "_id": 1, "n": "a" }]).await.unwrap();
    let first = db.from("bears").pull().await.unwrap().into_document().unwrap().unwrap();
    assert_eq!(first, doc! { "_id": 1, "n": "a" });
    let oldest_name = db.from("bears").sort(doc! { "n": -1 }).pull().await.unwrap();
    assert_eq!(oldest_name, Outcome::Found(Some(doc! { "_id": 3, "n": "c" })));
    assert_eq!(db.from("bears").count().run().await.unwrap(), Outcome::Count(0));
}

#[tokio::test]
async fn remove_requires_a_filter() {
    let db = zoo().await;
    let err = db.from("bears").remove().await.unwrap_err();
    assert!(matches!(err, DbError::Invalid(m) if m.contains("remove_all")));
    assert_eq!(db.from("bears").count().run().await.unwrap(), Outcome::Count(4));

    let out = db.from("bears").filter(doc! { "kind": "brown" }).remove().await.unwrap();
    assert_eq!(out, Outcome::Removed(DeleteReport { deleted: 2 }));
    let left = db.from("bears").sort(doc! { "name": 1 }).run().await.unwrap().into_documents().unwrap();
    assert_eq!(names(&left), vec!["iorek", "paddington"]);

    let out = db.from("bears").remove_all().await.unwrap();
    assert_eq!(out, Outcome::Removed(DeleteReport { deleted: 2 }));
}

#[tokio::test]
async fn insert_rejects_duplicate_ids() {
    let db = Minq::memory("zoo");
    db.from("bears").insert(doc! { "_id": 1 }).await.unwrap();
    let err = db.from("bears").insert(doc! { "_id": 1 }).await.unwrap_err();
    assert!(matches!(err, DbError::Store(m) if m.contains("duplicate")));
    let err = db.from("bears").insert(Bson::Int32(5)).await.unwrap_err();
    assert!(matches!(err, DbError::Build(_)));
}

#[tokio::test]
async fn writes_start_without_being_awaited() {
    let db = Minq::memory("zoo");
    drop(db.from("bears").insert(doc! { "name": "eager" }));
    let mut seen = Outcome::Count(0);
    for _ in 0..100 {
        tokio::task::yield_now().await;
        seen = db.from("bears").count().run().await.unwrap();
        if seen == Outcome::Count(1) {
            break;
        }
    }
    assert_eq!(seen, Outcome::Count(1));
}

#[test]
fn writes_are_lazy_outside_a_runtime() {
    let db = Minq::memory("zoo");
    let pending = db.from("bears").insert(doc! { "name": "lazy" });
    let count = futures::executor::block_on(db.from("bears").count().run()).unwrap();
    assert_eq!(count, Outcome::Count(0));
    futures::executor::block_on(pending).unwrap();
    let count = futures::executor::block_on(db.from("bears").count().run()).unwrap();
    assert_eq!(count, Outcome::Count(1));
}
