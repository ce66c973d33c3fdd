use super::_support::{names, zoo};
use bson::{Document, doc};
use futures::{SinkExt, StreamExt, TryStreamExt};
use minq::DbError;

#[tokio::test]
async fn stream_emits_each_limited_document_then_ends() {
    let db = zoo().await;
    let items: Vec<Result<Document, DbError>> =
        db.from("bears").sort(doc! { "age": 1 }).limit(3).stream().collect().await;
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(Result::is_ok));
    let docs: Vec<Document> = items.into_iter().map(Result::unwrap).collect();
    assert_eq!(names(&docs), vec!["boo boo", "paddington", "yogi"]);
}

#[tokio::test]
async fn stream_of_non_read_is_forced_to_read() {
    let db = zoo().await;
    let docs: Vec<Document> = db.from("bears").count().stream().try_collect().await.unwrap();
    assert_eq!(docs.len(), 4);
}

#[tokio::test]
async fn stream_without_collection_errors_once() {
    let db = zoo().await;
    let items: Vec<_> = db.query().stream().collect().await;
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(DbError::Invalid(m)) if m.contains("collection")));
}

#[tokio::test]
async fn stream_reports_filter_errors_as_items() {
    let db = zoo().await;
    let items: Vec<_> = db.from("bears").filter(doc! { "age": { "$bogus": 1 } }).stream().collect().await;
    assert!(matches!(items.as_slice(), [Err(DbError::QueryError(_))]));
}

#[tokio::test]
async fn pipe_forwards_into_a_sink() {
    let db = zoo().await;
    let (tx, rx) = futures::channel::mpsc::unbounded::<Document>();
    let sink = tx.sink_map_err(|e| DbError::Store(e.to_string()));
    db.from("bears").filter(doc! { "kind": "brown" }).select(["name"]).pipe(sink).await.unwrap();
    let got: Vec<Document> = rx.collect().await;
    assert_eq!(names(&got), vec!["yogi", "boo boo"]);
    assert!(got.iter().all(|d| d.len() == 2));
}

#[tokio::test]
async fn pipe_surfaces_stream_errors() {
    let db = zoo().await;
    let (tx, _rx) = futures::channel::mpsc::unbounded::<Document>();
    let sink = tx.sink_map_err(|e| DbError::Store(e.to_string()));
    let err = db.from("bears").by_ids("nope").pipe(sink).await.unwrap_err();
    assert!(matches!(err, DbError::Build(_)));
}

#[tokio::test]
async fn for_each_visits_in_order() {
    let db = zoo().await;
    let mut ages = Vec::new();
    db.from("bears")
        .sort(doc! { "age": -1 })
        .for_each(|d| ages.push(d.get_i32("age").unwrap()))
        .await
        .unwrap();
    assert_eq!(ages, vec![40, 30, 12, 5]);
}

#[tokio::test]
async fn for_each_stops_on_error() {
    let db = zoo().await;
    let mut visited = 0;
    let err = db.from("bears").filter(doc! { "$where": "1" }).for_each(|_| visited += 1).await.unwrap_err();
    assert!(matches!(err, DbError::QueryError(_)));
    assert_eq!(visited, 0);
}

#[tokio::test]
async fn scalar_query_streams_one_document() {
    let db = zoo().await;
    let docs: Vec<Document> = db.from("bears").first().limit(3).stream().try_collect().await.unwrap();
    assert_eq!(docs.len(), 1);
    let mut seen = 0;
    db.from("bears").sort(doc! { "age": 1 }).first().limit(4).for_each(|_| seen += 1).await.unwrap();
    assert_eq!(seen, 1);
}
