use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use remotefs_resource::ResourcePath;

use crate::cache::DiskCache;
use crate::config::{Credentials, RemoteConfig};
use crate::executor::HttpExecutor;
use crate::types::{HttpRequest, HttpResponse};
use crate::writeback::WriteBack;
use crate::Error;

/// Characters escaped inside a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// State shared by every node of one client tree.
///
/// Owned by the root container. Settings changed here apply to requests
/// started afterwards by any node of the tree.
pub struct Connection {
    transport: Arc<dyn HttpExecutor>,
    base_url: String,
    credentials: RwLock<Option<Credentials>>,
    write_back: RwLock<Option<Arc<dyn WriteBack>>>,
    cache: RwLock<Option<DiskCache>>,
}

impl Connection {
    pub(crate) fn new(transport: Arc<dyn HttpExecutor>, config: &RemoteConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.clone(),
            credentials: RwLock::new(config.credentials.clone()),
            write_back: RwLock::new(None),
            cache: RwLock::new(config.cache_dir.clone().map(DiskCache::new)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        *self.credentials.write().unwrap_or_else(PoisonError::into_inner) = credentials;
    }

    pub fn write_back(&self) -> Option<Arc<dyn WriteBack>> {
        self.write_back
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attach an executor for deferred writes, or detach it with `None`.
    pub fn set_write_back(&self, write_back: Option<Arc<dyn WriteBack>>) {
        *self.write_back.write().unwrap_or_else(PoisonError::into_inner) = write_back;
    }

    pub fn disk_cache(&self) -> Option<DiskCache> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_cache_dir(&self, cache_dir: Option<PathBuf>) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = cache_dir.map(DiskCache::new);
    }

    /// `{base}{endpoint}{path}` with every path segment percent-encoded.
    pub(crate) fn endpoint(&self, endpoint: &str, path: &ResourcePath) -> String {
        let mut url = format!("{}{}", self.base_url, endpoint);
        if path.is_root() {
            url.push('/');
        }
        for segment in path.iter() {
            url.push('/');
            url.extend(utf8_percent_encode(segment, SEGMENT));
        }
        url
    }

    /// Execute `request`, failing on transport errors and non-2xx statuses.
    pub(crate) fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let request = request.with_credentials(self.credentials());
        let method = request.method;
        let url = request.full_url();
        let wrap = |source: Error| Error::Request {
            method,
            url: url.clone(),
            source: Box::new(source),
        };

        tracing::debug!(%method, %url, "sending request");
        let response = self.transport.execute(&request).map_err(wrap)?;
        if !response.is_success() {
            let message = response
                .body_text()
                .filter(|text| !text.trim().is_empty())
                .unwrap_or_else(|| response.status_text.clone());
            return Err(wrap(Error::Status {
                status: response.status,
                message,
            }));
        }
        Ok(response)
    }

    /// Like [`Connection::send`], also requiring a response body.
    pub(crate) fn fetch(&self, request: HttpRequest) -> Result<(HttpResponse, Bytes), Error> {
        let method = request.method;
        let url = request.full_url();
        let mut response = self.send(request)?;
        match response.body.take() {
            Some(body) => Ok((response, body)),
            None => Err(Error::Request {
                method,
                url,
                source: Box::new(Error::MissingBody),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::MockExecutor;
    use crate::types::Method;

    fn connection(mock: &MockExecutor) -> Connection {
        let config = RemoteConfig::new("http://host/api").unwrap();
        Connection::new(Arc::new(mock.clone()), &config)
    }

    #[test]
    fn endpoint_encodes_segments() {
        let connection = connection(&MockExecutor::new());
        assert_eq!(
            connection.endpoint("list", &ResourcePath::root()),
            "http://host/api/list/"
        );
        let path = ResourcePath::parse("/my docs/a#1.txt").unwrap();
        assert_eq!(
            connection.endpoint("resource", &path),
            "http://host/api/resource/my%20docs/a%231.txt"
        );
    }

    #[test]
    fn send_wraps_status_errors() {
        let mock = MockExecutor::new().with_response(
            Method::GET,
            "http://host/api/resource/a",
            HttpResponse::text(403, "forbidden"),
        );
        let connection = connection(&mock);
        let err = connection
            .send(HttpRequest::get("http://host/api/resource/a"))
            .unwrap_err();
        assert_eq!(err.status(), Some(403));
        assert!(err.to_string().contains("http://host/api/resource/a"));
        assert!(err.to_string().contains("forbidden"));
    }

    #[test]
    fn fetch_requires_body() {
        let mock = MockExecutor::new().with_response(
            Method::GET,
            "http://host/api/resource/a",
            MockExecutor::empty(204),
        );
        let connection = connection(&mock);
        let err = connection
            .fetch(HttpRequest::get("http://host/api/resource/a"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Request { ref source, .. } if matches!(**source, Error::MissingBody)
        ));
    }

    #[test]
    fn credentials_are_attached() {
        let mock = MockExecutor::new();
        let connection = connection(&mock);
        connection.set_credentials(Some(Credentials::new("alice", None)));
        let _ = connection.send(HttpRequest::get("http://host/api/exists/"));

        let recorded = mock.recorded_requests();
        assert_eq!(recorded[0].credentials.as_ref().unwrap().username, "alice");
    }

    #[test]
    fn transport_failures_carry_the_url() {
        let mock = MockExecutor::new().fail_with("connection refused");
        let connection = connection(&mock);
        let request = HttpRequest::get("http://host/api/list/").with_query("recursive", true);
        let err = connection.send(request).unwrap_err();
        assert!(err.to_string().contains("list/?recursive=true"));
        assert!(err.to_string().contains("connection refused"));
    }
}
