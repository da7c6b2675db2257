use chrono::NaiveDate;
use mis_analytics::record::MisRecord;
use mis_analytics::store::{Cell, MisStore, SupabaseStore};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(store: &str, value: Option<f64>) -> MisRecord {
    MisRecord {
        store_name: store.to_string(),
        cafe_code: Some("C001".into()),
        region: Some("Mumbai".into()),
        area_store: Some(1200.0),
        store_start_date: NaiveDate::from_ymd_opt(2019, 4, 1),
        vintage: Some("2019".into()),
        category: Some("CWK".into()),
        for_ssg: Some("SSG".into()),
        parameter: "Revenue".into(),
        month: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        value,
    }
}

fn store(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(&server.uri(), "anon-key").unwrap()
}

#[tokio::test]
async fn insert_posts_rows_with_minimal_return() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/mis_long"))
        .and(header("apikey", "anon-key"))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("prefer", "return=minimal"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let rows = vec![record("Bandra", Some(2500.5)), record("Andheri", None)];
    let inserted = store(&server).insert_batch(&rows).await.unwrap();
    assert_eq!(inserted, 2);

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body[0]["store_name"], "Bandra");
    assert_eq!(body[0]["month"], "2024-01-01");
    assert!(body[1]["value"].is_null());
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let server = MockServer::start().await;
    assert_eq!(store(&server).insert_batch(&[]).await.unwrap(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn row_count_reads_content_range() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/mis_long"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "0-0/3573")
                .set_body_json(json!([{ "store_name": "Bandra" }])),
        )
        .mount(&server)
        .await;

    assert_eq!(store(&server).row_count().await.unwrap(), 3573);
}

#[tokio::test]
async fn clear_filters_on_store_name() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/mis_long"))
        .and(query_param("store_name", "not.is.null"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    store(&server).clear().await.unwrap();
}

#[tokio::test]
async fn query_goes_through_exec_sql() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/exec_sql"))
        .and(body_json(json!({ "sql": "SELECT region, SUM(value) AS total FROM mis_long GROUP BY region" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "region": "Mumbai", "total": 2500.5 },
            { "region": "Delhi", "total": null }
        ])))
        .mount(&server)
        .await;

    let res = store(&server)
        .query("SELECT region, SUM(value) AS total FROM mis_long GROUP BY region")
        .await
        .unwrap();
    assert_eq!(res.columns, vec!["region", "total"]);
    assert_eq!(res.rows[0][1], Cell::Float(2500.5));
    assert_eq!(res.rows[1][1], Cell::Null);
}

#[tokio::test]
async fn missing_table_reports_ddl() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/mis_long"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "relation \"public.mis_long\" does not exist"
        })))
        .mount(&server)
        .await;

    let err = store(&server).ensure_schema().await.unwrap_err();
    assert!(err.to_string().contains("CREATE TABLE"), "{err}");
}

#[tokio::test]
async fn failed_insert_surfaces_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/mis_long"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid input syntax"))
        .mount(&server)
        .await;

    let err = store(&server)
        .insert_batch(&[record("Bandra", Some(1.0))])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid input syntax"), "{err}");
}
