//! HTTP execution abstraction.
//!
//! The client tree never talks to the network directly: every round trip
//! goes through an [`HttpExecutor`], which may be a real HTTP client, a
//! [`ResourceServer`](crate::ResourceServer) mounted in process, or a mock.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::redirect;

use crate::config::DEFAULT_TIMEOUT;
use crate::types::{HttpRequest, HttpResponse, Method};
use crate::Error;

/// Performs one HTTP round trip.
pub trait HttpExecutor: Send + Sync {
    /// Non-2xx statuses are not errors at this level; `Err` means the
    /// request never produced a response.
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error>;
}

/// Blocking reqwest transport.
///
/// Redirects are never followed: a 3xx response is handed back as is.
pub struct ReqwestExecutor {
    client: Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    fn prepare(&self, request: &HttpRequest) -> Result<RequestBuilder, Error> {
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .query(&request.query);
        for (name, value) in &request.headers {
            builder = builder.header(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }
        if let Some(credentials) = &request.credentials {
            builder = builder.basic_auth(&credentials.username, credentials.password.as_deref());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_vec());
        }
        Ok(builder)
    }
}

fn convert(response: Response) -> Result<HttpResponse, Error> {
    let status = response.status();
    let headers: HashMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.as_str().to_ascii_lowercase(), value.to_string()))
        })
        .collect();

    let body = if matches!(status.as_u16(), 204 | 304) {
        None
    } else {
        Some(response.bytes()?)
    };

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers,
        body,
    })
}

impl HttpExecutor for ReqwestExecutor {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        let response = self.prepare(request)?.send()?;
        convert(response)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockExecutor;
    use super::*;

    const A_TXT: &str = "http://host/resource/a.txt";

    #[test]
    fn mock_answers_by_method_and_url() {
        let executor = MockExecutor::new().with_response(
            Method::GET,
            A_TXT,
            MockExecutor::ok("abc", "text/plain"),
        );

        let hit = executor.execute(&HttpRequest::get(A_TXT)).unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.body_text().as_deref(), Some("abc"));

        let other_method = executor.execute(&HttpRequest::delete(A_TXT)).unwrap();
        assert_eq!(other_method.status, 404);
    }

    #[test]
    fn mock_prefers_exact_query() {
        let executor = MockExecutor::new()
            .with_response(
                Method::GET,
                "http://host/list/?full=true",
                MockExecutor::ok("full", "text/plain"),
            )
            .with_response(
                Method::GET,
                "http://host/list/",
                MockExecutor::ok("any", "text/plain"),
            );

        let full = HttpRequest::get("http://host/list/").with_query("full", true);
        let shallow = HttpRequest::get("http://host/list/").with_query("full", false);
        assert_eq!(executor.execute(&full).unwrap().body_text().as_deref(), Some("full"));
        assert_eq!(executor.execute(&shallow).unwrap().body_text().as_deref(), Some("any"));
    }

    #[test]
    fn mock_forced_failure_is_a_transport_error() {
        let executor = MockExecutor::new().fail_with("connection refused");
        let result = executor.execute(&HttpRequest::get(A_TXT));

        assert!(
            matches!(result, Err(Error::Transport { ref message }) if message == "connection refused")
        );
        assert_eq!(executor.recorded_requests().len(), 1);
    }

    #[test]
    fn mock_keeps_request_log() {
        let executor = MockExecutor::new();
        executor.execute(&HttpRequest::get("http://host/list/")).unwrap();
        executor.execute(&HttpRequest::post("http://host/resource/")).unwrap();
        executor.execute(&HttpRequest::delete(A_TXT)).unwrap();

        let methods: Vec<_> = executor
            .recorded_requests()
            .iter()
            .map(|request| request.method)
            .collect();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::DELETE]);
        assert_eq!(executor.count_matching("/resource/"), 2);

        executor.clear_recorded();
        assert_eq!(executor.count_matching("/"), 0);
    }

    #[test]
    fn reqwest_executor_builds() {
        assert!(ReqwestExecutor::new(DEFAULT_TIMEOUT).is_ok());
        assert!(ReqwestExecutor::new(Duration::from_millis(250)).is_ok());
    }
}
