use super::_support::{names, zoo};
use bson::{Bson, doc};
use minq::{DbError, Minq, Outcome, like};

#[tokio::test]
async fn read_sorts_limits_and_projects() {
    let db = zoo().await;
    let docs = db
        .from("bears")
        .sort(doc! { "age": -1 })
        .skip(1)
        .limit(2)
        .select(doc! { "_id": 0, "name": 1 })
        .run()
        .await
        .unwrap()
        .into_documents()
        .unwrap();
    assert_eq!(docs, vec![doc! { "name": "yogi" }, doc! { "name": "paddington" }]);
}

#[tokio::test]
async fn filters_compose() {
    let db = zoo().await;
    let brown = db.from("bears").filter(doc! { "kind": "brown" });
    let young = brown.clone().filter(doc! { "age": { "$lt": 10 } });
    assert_eq!(brown.count().run().await.unwrap(), Outcome::Count(2));
    let docs = young.run().await.unwrap().into_documents().unwrap();
    assert_eq!(names(&docs), vec!["boo boo"]);
}

#[tokio::test]
async fn not_matches_false_null_and_missing() {
    let db = zoo().await;
    let docs = db.from("bears").not("polar").sort(doc! { "name": 1 }).run().await.unwrap();
    assert_eq!(names(&docs.into_documents().unwrap()), vec!["boo boo", "paddington", "yogi"]);
}

#[tokio::test]
async fn like_is_case_insensitive_and_literal() {
    let db = zoo().await;
    let hit = db.from("bears").filter(doc! { "name": like("IOREK") }).exists().run().await.unwrap();
    assert_eq!(hit, Outcome::Exists(true));
    let miss = db.from("bears").filter(doc! { "name": like("y.gi") }).exists().run().await.unwrap();
    assert_eq!(miss, Outcome::Exists(false));
}

#[tokio::test]
async fn first_returns_document_or_default() {
    let db = zoo().await;
    let yogi = db.from("bears").filter(doc! { "name": "yogi" }).first().run().await.unwrap();
    assert_eq!(yogi.into_document().unwrap().unwrap().get_i32("age").unwrap(), 30);

    let nobody = db.from("bears").filter(doc! { "name": "smokey" });
    assert_eq!(nobody.clone().first_or_default(false).run().await.unwrap(), Outcome::One(Bson::Boolean(false)));
    assert_eq!(nobody.clone().first_or_default(0).run().await.unwrap(), Outcome::One(Bson::Int32(0)));
    let err = nobody.first().run().await.unwrap_err();
    assert!(matches!(err, DbError::NotFound(m) if m.contains("bears")));
}

#[tokio::test]
async fn by_id_and_by_ids_find_inserted_documents() {
    let db = Minq::memory("zoo");
    let report = db.from("bears").insert(vec![doc! { "name": "a" }, doc! { "name": "b" }, doc! { "name": "c" }]).await.unwrap();
    let Outcome::Inserted(report) = report else { panic!("unexpected outcome") };
    let ids: Vec<String> = report.inserted_ids.iter().map(|id| id.as_object_id().unwrap().to_hex()).collect();

    let b = db.from("bears").by_id(ids[1].clone()).run().await.unwrap();
    assert_eq!(b.into_document().unwrap().unwrap().get_str("name").unwrap(), "b");

    let picked = vec![Bson::String(ids[0].clone()), Bson::String(ids[2].clone())];
    let docs = db.from("bears").by_ids(picked).run().await.unwrap().into_documents().unwrap();
    assert_eq!(names(&docs), vec!["a", "c"]);
}

#[tokio::test]
async fn string_ids_are_matched_as_strings() {
    let db = Minq::memory("zoo");
    db.from("bears").insert(doc! { "_id": "23", "name": "numbered" }).await.unwrap();
    let found = db.from("bears").by_id(23).run().await.unwrap();
    assert_eq!(found.into_document().unwrap().unwrap().get_str("name").unwrap(), "numbered");
}

#[tokio::test]
async fn aggregate_runs_supported_stages() {
    let db = zoo().await;
    let docs = db
        .from("bears")
        .aggregate(vec![
            doc! { "$match": { "kind": "brown" } },
            doc! { "$sort": { "age": 1 } },
            doc! { "$project": { "_id": 0, "name": 1 } },
        ])
        .run()
        .await
        .unwrap();
    assert_eq!(docs, Outcome::Many(vec![doc! { "name": "boo boo" }, doc! { "name": "yogi" }]));

    let counted = db
        .from("bears")
        .aggregate(vec![doc! { "$match": { "age": { "$gte": 12 } } }, doc! { "$count": "old" }])
        .run()
        .await
        .unwrap();
    assert_eq!(counted, Outcome::Many(vec![doc! { "old": 3i64 }]));

    let err = db.from("bears").aggregate(vec![doc! { "$group": { "_id": "$kind" } }]).run().await.unwrap_err();
    assert!(matches!(err, DbError::QueryError(m) if m.contains("$group")));
}

#[tokio::test]
async fn unknown_filter_operators_fail() {
    let db = zoo().await;
    let err = db.from("bears").filter(doc! { "age": { "$near": 3 } }).run().await.unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
}

#[tokio::test]
async fn collection_names_are_bare() {
    let db = zoo().await;
    db.from("keepers").insert(doc! { "name": "ranger smith" }).await.unwrap();
    assert_eq!(db.collection_names().await.unwrap(), vec!["bears".to_string(), "keepers".to_string()]);
}

#[tokio::test]
async fn disconnect_closes_the_database() {
    let db = zoo().await;
    db.disconnect().await.unwrap();
    let err = db.from("bears").count().run().await.unwrap_err();
    assert!(matches!(err, DbError::Store(m) if m.contains("closed")));
}
