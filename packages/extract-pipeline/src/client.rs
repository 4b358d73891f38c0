//! Record service HTTP client.
//!
//! One [`RecordClient`] per domain: a base URL, a resource path and a
//! request timeout, bundled with the listing, lookup and health calls.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use extract_pipeline::client::{AttendanceFilter, RecordClient};
//!
//! let sis = RecordClient::new("http://localhost:8001", "attendance", Duration::from_secs(30))?;
//! let page = sis
//!     .list(&AttendanceFilter { course_id: Some("BUZZ-MATH-7".into()), ..Default::default() }.into(), 100, 0)
//!     .await?;
//! println!("{} of {}", page.data.len(), page.total);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use record_service::{Lookup, PageResult};
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::error::ClientError;

/// Exact-match filters sent as query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters(Vec<(String, String)>);

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.0.push((name.into(), value.to_string()));
        self
    }

    /// Add the filter only when a value is present.
    pub fn with_opt<V: ToString>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub student_id: Option<i64>,
    pub course_id: Option<String>,
}

impl From<AttendanceFilter> for Filters {
    fn from(f: AttendanceFilter) -> Self {
        Filters::new()
            .with_opt("student_id", f.student_id)
            .with_opt("course_id", f.course_id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradebookFilter {
    pub student_id: Option<i64>,
    pub course_id: Option<String>,
    pub teacher: Option<String>,
}

impl From<GradebookFilter> for Filters {
    fn from(f: GradebookFilter) -> Self {
        Filters::new()
            .with_opt("student_id", f.student_id)
            .with_opt("course_id", f.course_id)
            .with_opt("teacher", f.teacher)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IsatFilter {
    pub course_id: Option<String>,
    pub math_level: Option<String>,
    pub ela_level: Option<String>,
}

impl From<IsatFilter> for Filters {
    fn from(f: IsatFilter) -> Self {
        Filters::new()
            .with_opt("course_id", f.course_id)
            .with_opt("math_level", f.math_level)
            .with_opt("ela_level", f.ela_level)
    }
}

/// Anything that serves offset/limit pages of records.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Human-readable source name for logs
    fn describe(&self) -> String;

    async fn list(
        &self,
        filters: &Filters,
        limit: usize,
        offset: usize,
    ) -> Result<PageResult, ClientError>;
}

pub struct RecordClient {
    http: reqwest::Client,
    base_url: Url,
    resource: String,
    timeout: Duration,
}

impl RecordClient {
    /// Build a client for `<base_url>/<resource>`.
    ///
    /// The timeout applies to every request; exceeding it fails the call.
    pub fn new(
        base_url: &str,
        resource: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ClientError::Http {
                url: base_url.to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: parsed,
            resource: resource.into(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetch one page of the resource.
    pub async fn list(
        &self,
        filters: &Filters,
        limit: usize,
        offset: usize,
    ) -> Result<PageResult, ClientError> {
        let mut params = filters.pairs().to_vec();
        params.push(("limit".to_string(), limit.to_string()));
        params.push(("offset".to_string(), offset.to_string()));

        let url = self.url(&[&self.resource]);
        self.get_json(url, &params).await
    }

    /// Look up one entity by primary key.
    pub async fn get_by_key(&self, key: &str) -> Result<Lookup, ClientError> {
        let url = self.url(&[&self.resource, key]);
        self.get_json(url, &[]).await
    }

    /// True when the service answers `GET /` with `status: "healthy"`.
    pub async fn health_check(&self) -> bool {
        let url = self.url(&[]);
        match self.get_json::<serde_json::Value>(url, &[]).await {
            Ok(body) => body.get("status").and_then(|s| s.as_str()) == Some("healthy"),
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "health check failed");
                false
            }
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in `new`: a base URL always has path segments
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        params: &[(String, String)],
    ) -> Result<T, ClientError> {
        let label = url.to_string();
        let resp = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&label, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                url: label,
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| ClientError::from_reqwest(&label, e))
    }
}

#[async_trait]
impl PageSource for RecordClient {
    fn describe(&self) -> String {
        self.url(&[&self.resource]).to_string()
    }

    async fn list(
        &self,
        filters: &Filters,
        limit: usize,
        offset: usize,
    ) -> Result<PageResult, ClientError> {
        RecordClient::list(self, filters, limit, offset).await
    }
}
