//! HTTP surface tests against in-memory datasets.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use record_service::{
    build_app, build_router, DatasetLoader, LoadError, MemoryLoader, PageResult, Record, Scalar,
    System,
};
use serde_json::Value;
use tower::ServiceExt;

fn attendance_row(id: i64, course: &str) -> Record {
    let mut r = Record::new();
    r.insert("student_id".into(), Scalar::Int(id));
    r.insert("student_name".into(), Scalar::from(format!("Student {id}")));
    r.insert("course_id".into(), Scalar::from(course));
    r.insert("2026-01-05".into(), Scalar::from(""));
    r
}

fn attendance(n: i64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let course = if i % 3 == 0 { "BUZZ-MATH-7" } else { "BUZZ-ELA-8" };
            attendance_row(1001 + i, course)
        })
        .collect()
}

fn isat_row(eduid: &str, math: &str, score: Option<f64>) -> Record {
    let mut r = Record::new();
    r.insert("eduid".into(), Scalar::from(eduid));
    r.insert("course_id".into(), Scalar::from("BUZZ-MATH-7"));
    r.insert("section_id".into(), Scalar::from("SEC-01"));
    r.insert("math_performance_level".into(), Scalar::from(math));
    r.insert("ela_performance_level".into(), Scalar::from("Basic"));
    r.insert("math_scale_score".into(), Scalar::from(score));
    r
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn sis(rows: Vec<Record>) -> Router {
    let loader = MemoryLoader::new().with_table("attendance", rows);
    build_router(System::Sis, Arc::new(loader))
}

#[tokio::test]
async fn health_lists_endpoints() {
    let (status, body) = get(sis(vec![]), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["system"], "SIS");
    assert_eq!(body["endpoints"], serde_json::json!(["/attendance"]));
}

#[tokio::test]
async fn list_uses_default_window() {
    let (status, body) = get(sis(attendance(150)), "/attendance").await;
    assert_eq!(status, StatusCode::OK);

    let page: PageResult = serde_json::from_value(body).unwrap();
    assert_eq!(page.total, 150);
    assert_eq!(page.limit, 100);
    assert_eq!(page.offset, 0);
    assert_eq!(page.data.len(), 100);
}

#[tokio::test]
async fn total_counts_filtered_rows_before_slicing() {
    let (status, body) = get(
        sis(attendance(30)),
        "/attendance?course_id=BUZZ-MATH-7&limit=4&offset=2",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let page: PageResult = serde_json::from_value(body).unwrap();
    assert_eq!(page.total, 10);
    assert_eq!(page.data.len(), 4);
    assert!(page
        .data
        .iter()
        .all(|r| r["course_id"] == Scalar::from("BUZZ-MATH-7")));
}

#[tokio::test]
async fn integer_filter_matches_student() {
    let (_, body) = get(sis(attendance(30)), "/attendance?student_id=1007").await;
    let page: PageResult = serde_json::from_value(body).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0]["student_id"], Scalar::Int(1007));
}

#[tokio::test]
async fn offset_beyond_total_returns_empty_page() {
    let (status, body) = get(sis(attendance(5)), "/attendance?offset=5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 5);
    assert_eq!(body["data"], serde_json::json!([]));
}

#[tokio::test]
async fn out_of_range_pagination_is_rejected() {
    for uri in [
        "/attendance?limit=0",
        "/attendance?limit=1001",
        "/attendance?offset=-1",
        "/attendance?limit=abc",
        "/attendance?student_id=abc",
    ] {
        let (status, body) = get(sis(attendance(5)), uri).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{uri}");
        assert!(body["detail"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn lookup_returns_single_record() {
    let (status, body) = get(sis(attendance(5)), "/attendance/1003").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["student_id"], 1003);
    assert_eq!(body["student_name"], "Student 1003");
}

#[tokio::test]
async fn lookup_missing_student_is_404() {
    let (status, body) = get(sis(attendance(5)), "/attendance/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Student 4242 not found");
}

#[tokio::test]
async fn missing_dataset_names_the_file() {
    let app = build_router(System::Lms, Arc::new(MemoryLoader::new()));
    let (status, body) = get(app, "/gradebook").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Data file gradebook not found");
}

#[tokio::test]
async fn isat_lookup_returns_every_sitting() {
    let loader = MemoryLoader::new().with_table(
        "isat_data",
        vec![
            isat_row("123FAKE45", "Basic", Some(700.0)),
            isat_row("555FAKE55", "Advanced", Some(790.0)),
            isat_row("123FAKE45", "Proficient", Some(731.0)),
        ],
    );
    let app = build_router(System::State, Arc::new(loader));

    let (status, body) = get(app.clone(), "/isat/123FAKE45").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (status, body) = get(app, "/isat/000FAKE00").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Student with EDUID 000FAKE00 not found");
}

#[tokio::test]
async fn isat_level_filters_map_to_columns() {
    let loader = MemoryLoader::new().with_table(
        "isat_data",
        vec![
            isat_row("123FAKE45", "Basic", Some(700.0)),
            isat_row("555FAKE55", "Advanced", Some(790.0)),
        ],
    );
    let app = build_router(System::State, Arc::new(loader));

    let (_, body) = get(app, "/isat?math_level=Advanced").await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["eduid"], "555FAKE55");
}

#[tokio::test]
async fn missing_scores_serialize_as_null() {
    let loader = MemoryLoader::new().with_table(
        "isat_data",
        vec![isat_row("123FAKE45", "Basic", Some(f64::NAN))],
    );
    let app = build_router(System::State, Arc::new(loader));

    let (_, body) = get(app, "/isat").await;
    assert_eq!(body["data"][0]["math_scale_score"], Value::Null);
}

#[tokio::test]
async fn combined_service_serves_students_without_lookup() {
    let loader = MemoryLoader::new()
        .with_table("isat_data", vec![isat_row("123FAKE45", "Basic", Some(700.0))])
        .with_table("attendance", attendance(3));
    let app = build_router(System::Ieta, Arc::new(loader));

    let (status, body) = get(app.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["system"], "IETA");
    assert_eq!(body["endpoints"].as_array().map(Vec::len), Some(4));

    let (_, body) = get(app.clone(), "/students?section_id=SEC-01").await;
    assert_eq!(body["total"], 1);

    let (_, body) = get(app.clone(), "/attendance").await;
    assert_eq!(body["total"], 3);

    let (status, _) = get(app, "/students/123FAKE45").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dedicated_service_does_not_expose_other_domains() {
    let (status, body) = get(sis(attendance(3)), "/gradebook").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Not Found");
}

#[tokio::test]
async fn each_request_reloads_the_dataset() {
    let loader = MemoryLoader::new().with_table("attendance", attendance(3));
    let app = build_router(System::Sis, Arc::new(loader.clone()));

    let (_, body) = get(app.clone(), "/attendance").await;
    assert_eq!(body["total"], 3);

    loader.insert("attendance", attendance(8));
    let (_, body) = get(app, "/attendance").await;
    assert_eq!(body["total"], 8);
}

#[tokio::test]
async fn malformed_key_is_rejected_before_loading() {
    // No attendance dataset: a parsed key would surface the missing file
    let app = build_router(System::Sis, Arc::new(MemoryLoader::new()));

    let (status, body) = get(app.clone(), "/attendance/abc").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"], "student_id must be an integer, got \"abc\"");

    let (status, body) = get(app, "/attendance/1001").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Data file attendance not found");
}

struct SlowLoader(Duration);

#[async_trait]
impl DatasetLoader for SlowLoader {
    async fn load(&self, _dataset: &str) -> Result<Vec<Record>, LoadError> {
        tokio::time::sleep(self.0).await;
        Ok(attendance(3))
    }
}

#[tokio::test]
async fn slow_request_times_out() {
    let app = build_app(
        System::Sis,
        Arc::new(SlowLoader(Duration::from_secs(5))),
        Duration::from_millis(50),
    );
    let (status, _) = get(app, "/attendance").await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
}
