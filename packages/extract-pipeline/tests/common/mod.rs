//! Shared fixtures: record services served on ephemeral ports.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{routing::get, Json, Router};
use extract_pipeline::{ClientError, Filters, PageSource, PipelineConfig};
use record_service::{build_router, MemoryLoader, PageResult, Record, Scalar, System};
use tokio::net::TcpListener;

/// A record service running in the background.
pub struct TestService {
    pub base_url: String,
    pub loader: MemoryLoader,
}

/// Serve `system` from `loader` on 127.0.0.1 with a random port.
pub async fn spawn_service(system: System, loader: MemoryLoader) -> TestService {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(system, Arc::new(loader.clone()));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestService {
        base_url: format!("http://{addr}"),
        loader,
    }
}

/// A service whose `/attendance` answers only after `delay`.
///
/// Returns the base URL and a counter of requests received.
pub async fn spawn_slow_service(delay: Duration) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let app = Router::new().route(
        "/attendance",
        get(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                Json(PageResult {
                    total: 0,
                    limit: 100,
                    offset: 0,
                    data: Vec::new(),
                })
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}"), hits)
}

/// An address nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn attendance_rows(n: i64, status: &str) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let mut r = Record::new();
            r.insert("student_id".into(), Scalar::Int(1001 + i));
            r.insert("student_name".into(), Scalar::from(format!("Student {i}")));
            r.insert("course_id".into(), Scalar::from("BUZZ-MATH-7"));
            r.insert("2026-01-05".into(), Scalar::from(status));
            r
        })
        .collect()
}

pub fn gradebook_rows(n: i64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let mut r = Record::new();
            r.insert("student_id".into(), Scalar::Int(1001 + i));
            r.insert("course_id".into(), Scalar::from("BUZZ-ELA-8"));
            r.insert("teacher".into(), Scalar::from("Ms. Baker"));
            r.insert(
                "assignment_1".into(),
                Scalar::from(if i % 4 == 0 { None } else { Some(80.5) }),
            );
            r.insert("current_grade".into(), Scalar::from(82.25));
            r
        })
        .collect()
}

pub fn isat_rows(n: i64) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let mut r = Record::new();
            r.insert("eduid".into(), Scalar::from(format!("{:03}FAKE{:02}", i, i % 100)));
            r.insert("course_id".into(), Scalar::from("BUZZ-MATH-7"));
            r.insert("section_id".into(), Scalar::from("SEC-01"));
            r.insert("math_performance_level".into(), Scalar::from("Proficient"));
            r.insert("ela_performance_level".into(), Scalar::from("Basic"));
            r.insert("math_scale_score".into(), Scalar::Int(2500 + i));
            r
        })
        .collect()
}

/// Config pointing every domain at the given services.
pub fn config(sis: &str, lms: &str, state: &str, page_size: usize) -> PipelineConfig {
    PipelineConfig {
        sis_api_url: sis.to_string(),
        lms_api_url: lms.to_string(),
        state_api_url: state.to_string(),
        page_size,
        warehouse_path: ":memory:".to_string(),
        ..Default::default()
    }
}

/// In-process page source that records every requested window.
pub struct FakeSource {
    rows: Vec<Record>,
    pub calls: AtomicUsize,
    pub fail_at_offset: Option<usize>,
    pub windows: std::sync::Mutex<Vec<(usize, usize)>>,
}

impl FakeSource {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            calls: AtomicUsize::new(0),
            fail_at_offset: None,
            windows: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at_offset = Some(offset);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for FakeSource {
    fn describe(&self) -> String {
        "fake".to_string()
    }

    async fn list(
        &self,
        _filters: &Filters,
        limit: usize,
        offset: usize,
    ) -> Result<PageResult, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.windows.lock().unwrap().push((offset, limit));

        if self.fail_at_offset == Some(offset) {
            return Err(ClientError::Status {
                url: "fake".to_string(),
                status: 500,
                body: "boom".to_string(),
            });
        }

        let data: Vec<Record> = self.rows.iter().skip(offset).take(limit).cloned().collect();
        Ok(PageResult {
            total: self.rows.len(),
            limit,
            offset,
            data,
        })
    }
}
