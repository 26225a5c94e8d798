//! Server side: exposes a resource tree over the remotefs HTTP protocol.
//!
//! [`ResourceServer`] is a pure function from [`HttpRequest`] to
//! [`HttpResponse`]. Any HTTP framework can host it, and it also implements
//! [`HttpExecutor`] so a client tree can be mounted on it in process.
//!
//! Routes, relative to the mount point:
//!
//! | route | method | answer |
//! |---|---|---|
//! | `/exists[/path]` | GET | `true` or `false` |
//! | `/resource/path` | GET | content of a readable resource |
//! | `/resource/path` | PUT | replace content, creating the resource and its parents |
//! | `/resource[/path]?name=&type=` | POST | create a child |
//! | `/resource/path` | DELETE | delete a resource |
//! | `/list[/path]?recursive=&full=` | GET | [`Listing`] of a container |

use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use remotefs_resource::{
    guess_content_type, mkdirs, read_all, resolve, write_all, Error as ResourceError, Readable,
    ResourcePath, ResourceRef, DEFAULT_CONTENT_TYPE,
};

use crate::executor::HttpExecutor;
use crate::listing::{Entry, Listing, JSON_CONTENT_TYPE, XML_CONTENT_TYPE};
use crate::types::{HttpRequest, HttpResponse, Method};
use crate::Error;

/// Items strictly smaller than this are inlined in full listings.
pub const DEFAULT_INLINE_THRESHOLD: u64 = 1024 * 1024 / 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// URL path prefix the routes live under.
    pub mount: String,
    pub inline_threshold: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mount: "/".to_string(),
            inline_threshold: DEFAULT_INLINE_THRESHOLD,
        }
    }
}

impl ServerConfig {
    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount.into();
        self
    }

    pub fn with_inline_threshold(mut self, threshold: u64) -> Self {
        self.inline_threshold = threshold;
        self
    }
}

/// Why a request could not be served.
#[derive(Debug, thiserror::Error)]
enum Failure {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

impl Failure {
    fn status(&self) -> u16 {
        match self {
            Failure::NotFound(_) => 404,
            Failure::BadRequest(_) => 400,
            Failure::MethodNotAllowed => 405,
            Failure::Internal(_) => 500,
        }
    }
}

impl From<ResourceError> for Failure {
    fn from(error: ResourceError) -> Self {
        let message = error.to_string();
        match error {
            ResourceError::NotFound { .. } => Failure::NotFound(message),
            ResourceError::Path(_)
            | ResourceError::AlreadyExists { .. }
            | ResourceError::NotCapable { .. } => Failure::BadRequest(message),
            _ => Failure::Internal(message),
        }
    }
}

/// Route and arguments extracted from a request URL.
struct Target {
    endpoint: String,
    path: ResourcePath,
    query: BTreeMap<String, String>,
}

impl Target {
    fn parse(request: &HttpRequest, mount: &str) -> Result<Self, Failure> {
        let (raw_path, raw_query) = split_url(&request.url);

        let mount = mount.trim_end_matches('/');
        let rest = raw_path
            .strip_prefix(mount)
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| Failure::NotFound(format!("'{raw_path}' is outside '{mount}/'")))?;

        let rest = rest.trim_start_matches('/');
        let (endpoint, remainder) = rest.split_once('/').unwrap_or((rest, ""));

        let mut components = Vec::new();
        for segment in remainder.split('/').filter(|s| !s.is_empty()) {
            let decoded = percent_decode_str(segment)
                .decode_utf8()
                .map_err(|_| Failure::BadRequest(format!("'{segment}' is not valid UTF-8")))?;
            components.push(decoded.into_owned());
        }
        let path = ResourcePath::try_from_components(components)
            .map_err(|err| Failure::BadRequest(err.to_string()))?;

        let mut query: BTreeMap<String, String> = url::form_urlencoded::parse(raw_query.as_bytes())
            .into_owned()
            .collect();
        query.extend(request.query.iter().map(|(k, v)| (k.clone(), v.clone())));

        Ok(Self {
            endpoint: endpoint.to_string(),
            path,
            query,
        })
    }

    fn flag(&self, name: &str) -> bool {
        self.query.get(name).is_some_and(|value| value == "true")
    }
}

/// Path and query string of a request URL, which may be absolute or just
/// a path.
fn split_url(url: &str) -> (&str, &str) {
    let after_scheme = match url.find("://") {
        Some(index) => {
            let rest = &url[index + 3..];
            rest.find('/').map_or("", |slash| &rest[slash..])
        }
        None => url,
    };
    let without_fragment = after_scheme.split('#').next().unwrap_or_default();
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));
    (if path.is_empty() { "/" } else { path }, query)
}

/// Serves a resource tree over HTTP.
pub struct ResourceServer {
    root: ResourceRef,
    config: ServerConfig,
}

impl ResourceServer {
    pub fn new(root: ResourceRef) -> Self {
        Self::with_config(root, ServerConfig::default())
    }

    pub fn with_config(root: ResourceRef, config: ServerConfig) -> Self {
        Self { root, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Answer one request. Failures become 4xx/5xx responses with a
    /// plain-text message.
    pub fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let response = match self.dispatch(request) {
            Ok(response) => response,
            Err(failure) => {
                if failure.status() >= 500 {
                    tracing::warn!(method = %request.method, url = %request.url, error = %failure, "request failed");
                }
                HttpResponse::text(failure.status(), failure.to_string())
            }
        };
        tracing::debug!(method = %request.method, url = %request.url, status = response.status, "served request");
        response
    }

    fn dispatch(&self, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        let target = Target::parse(request, &self.config.mount)?;
        match (target.endpoint.as_str(), request.method) {
            ("exists", Method::GET) => self.exists(&target),
            ("resource", Method::GET) => self.read(&target),
            ("resource", Method::PUT) => self.write(&target, request),
            ("resource", Method::POST) => self.create(&target),
            ("resource", Method::DELETE) => self.delete(&target),
            ("list", Method::GET) => self.list(&target, request),
            ("exists" | "resource" | "list", _) => Err(Failure::MethodNotAllowed),
            (other, _) => Err(Failure::NotFound(format!("unknown endpoint '{other}'"))),
        }
    }

    fn resolve(&self, path: &ResourcePath) -> Result<Option<remotefs_resource::Resolved>, Failure> {
        Ok(resolve(&self.root, path)?)
    }

    fn require(&self, path: &ResourcePath) -> Result<remotefs_resource::Resolved, Failure> {
        self.resolve(path)?
            .ok_or_else(|| Failure::NotFound(format!("the resource does not exist: {path}")))
    }

    fn exists(&self, target: &Target) -> Result<HttpResponse, Failure> {
        let exists = self.resolve(&target.path)?.is_some();
        Ok(HttpResponse::text(200, exists.to_string()))
    }

    fn read(&self, target: &Target) -> Result<HttpResponse, Failure> {
        let resource = self.require(&target.path)?.resource;
        let readable = resource
            .as_readable()
            .ok_or_else(|| Failure::BadRequest(format!("'{}' is not readable", target.path)))?;
        let size = resource.size().ok_or_else(|| {
            Failure::Internal(format!("can not establish the size of '{}'", target.path))
        })?;

        let content = read_all(readable)?;
        let content_type = match resource.content_type() {
            "" => DEFAULT_CONTENT_TYPE,
            other => other,
        };
        if content.len() as u64 != size {
            tracing::debug!(path = %target.path, size, read = content.len(), "size changed while reading");
        }

        Ok(HttpResponse::new(200)
            .with_header("content-length", content.len().to_string())
            .with_header("content-type", content_type)
            .with_header(
                "content-disposition",
                format!("attachment;filename={}", resource.name()),
            )
            .with_header(
                "x-resource-writable",
                resource.as_writable().is_some().to_string(),
            )
            .with_body(content))
    }

    fn write(&self, target: &Target, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        let Some(name) = target.path.name() else {
            return Err(Failure::BadRequest("can not write to the root".to_string()));
        };

        let resource = match self.resolve(&target.path)? {
            Some(resolved) => resolved.resource,
            None => {
                let parent_path = target.path.parent().unwrap_or_else(ResourcePath::root);
                let parent = mkdirs(&self.root, &parent_path)?;
                let manageable = parent
                    .as_container()
                    .and_then(|container| container.as_manageable())
                    .ok_or_else(|| {
                        Failure::BadRequest(format!("the parent '{parent_path}' is not manageable"))
                    })?;
                let content_type = match request.header("content-type").map(str::trim) {
                    Some(specific) if !specific.is_empty() && specific != DEFAULT_CONTENT_TYPE => {
                        specific.to_string()
                    }
                    _ => guess_content_type(name).to_string(),
                };
                tracing::debug!(path = %target.path, content_type = %content_type, "creating resource on write");
                manageable.create(name, &content_type)?
            }
        };

        let writable = resource
            .as_writable()
            .ok_or_else(|| Failure::BadRequest(format!("'{}' is not writable", target.path)))?;
        let body = request.body.clone().unwrap_or_default();
        write_all(writable, &body)?;
        Ok(HttpResponse::new(204))
    }

    fn create(&self, target: &Target) -> Result<HttpResponse, Failure> {
        let resource = self.require(&target.path)?.resource;
        let manageable = resource
            .as_container()
            .and_then(|container| container.as_manageable())
            .ok_or_else(|| Failure::BadRequest(format!("'{}' is not manageable", target.path)))?;

        let name = target
            .query
            .get("name")
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Failure::BadRequest("missing 'name' parameter".to_string()))?;
        let content_type = target
            .query
            .get("type")
            .filter(|ct| !ct.is_empty())
            .map_or(DEFAULT_CONTENT_TYPE, String::as_str);

        if let Some(container) = resource.as_container() {
            if container.child(name)?.is_some() {
                return Err(Failure::BadRequest(format!(
                    "a child named '{name}' already exists in '{}'",
                    target.path
                )));
            }
        }
        manageable.create(name, content_type)?;
        Ok(HttpResponse::new(201))
    }

    fn delete(&self, target: &Target) -> Result<HttpResponse, Failure> {
        let resolved = self.require(&target.path)?;
        let Some(parent) = resolved.parent else {
            return Err(Failure::BadRequest("can not delete the root".to_string()));
        };
        let manageable = parent
            .as_container()
            .and_then(|container| container.as_manageable())
            .ok_or_else(|| {
                Failure::BadRequest(format!("the parent of '{}' is not manageable", target.path))
            })?;
        manageable.delete(resolved.resource.name())?;
        Ok(HttpResponse::new(204))
    }

    fn list(&self, target: &Target, request: &HttpRequest) -> Result<HttpResponse, Failure> {
        let resource = self.require(&target.path)?.resource;
        if !resource.is_container() {
            return Err(Failure::BadRequest(format!(
                "'{}' is not listable",
                target.path
            )));
        }

        let listing = self.listing(
            &resource,
            &target.path,
            target.flag("recursive"),
            target.flag("full"),
        )?;

        let wants_json = request
            .header("accept")
            .is_some_and(|accept| accept.contains(JSON_CONTENT_TYPE));
        let (body, content_type) = if wants_json {
            (listing.to_json(), JSON_CONTENT_TYPE)
        } else {
            (listing.to_xml(), XML_CONTENT_TYPE)
        };
        let body = body.map_err(|err| Failure::Internal(err.to_string()))?;
        Ok(HttpResponse::new(200)
            .with_header("content-type", content_type)
            .with_body(body))
    }

    fn listing(
        &self,
        resource: &ResourceRef,
        path: &ResourcePath,
        recursive: bool,
        full: bool,
    ) -> Result<Listing, Failure> {
        let container = resource
            .as_container()
            .ok_or_else(|| Failure::BadRequest(format!("'{path}' is not listable")))?;
        let mut listing = Listing::new(path.to_string(), container.as_manageable().is_some());

        let mut children = container.children()?;
        children.retain(|child| !child.name().starts_with('.'));
        children.sort_by(|a, b| a.name().cmp(b.name()));

        for child in children {
            let child_path = match path.child(child.name()) {
                Ok(child_path) => child_path,
                Err(err) => {
                    tracing::warn!(parent = %path, name = child.name(), error = %err, "skipping unlistable child");
                    continue;
                }
            };
            let writable = match child.as_container() {
                Some(container) => container.as_manageable().is_some(),
                None => child.as_writable().is_some(),
            };
            let content_type = match child.content_type() {
                "" => DEFAULT_CONTENT_TYPE,
                other => other,
            };

            let mut entry = Entry {
                name: child.name().to_string(),
                hash: None,
                content_type: content_type.to_string(),
                size: child.size(),
                last_modified: child.last_modified(),
                writable,
                path: child_path.to_string(),
                children: None,
                content: None,
            };

            if child.is_container() {
                if recursive {
                    entry.children = Some(self.listing(&child, &child_path, recursive, full)?);
                }
            } else if full {
                if let Some(readable) = child.as_readable() {
                    match child.size() {
                        Some(size) if size < self.config.inline_threshold => {
                            entry.content = Some(Bytes::from(read_all(readable)?));
                        }
                        _ => entry.hash = Some(content_hash(readable)?),
                    }
                }
            }
            listing.entries.push(entry);
        }
        Ok(listing)
    }
}

/// MD5 hex digest of a readable resource, computed while streaming it.
fn content_hash(readable: &dyn Readable) -> Result<String, ResourceError> {
    let mut reader = readable.reader()?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 8192];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

impl HttpExecutor for ResourceServer {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, Error> {
        Ok(self.handle(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remotefs_resource::{Container, MemoryResource, Resource, DIRECTORY};

    fn server() -> (std::sync::Arc<MemoryResource>, ResourceServer) {
        let root = MemoryResource::directory("");
        root.add_file("a.txt", "text/plain", vec![b'a'; 50]);
        root.add_file(".hidden", "text/plain", b"secret".to_vec());
        let sub = root.add_directory("sub");
        sub.add_file("b.txt", "text/plain", b"hello".to_vec());
        let server = ResourceServer::new(root.clone());
        (root, server)
    }

    fn get(url: &str) -> HttpRequest {
        HttpRequest::get(format!("http://localhost{url}"))
    }

    #[test]
    fn exists_answers_true_or_false() {
        let (_, server) = server();
        assert_eq!(server.handle(&get("/exists")).body_text().unwrap(), "true");
        assert_eq!(server.handle(&get("/exists/sub/b.txt")).body_text().unwrap(), "true");
        assert_eq!(server.handle(&get("/exists/nope")).body_text().unwrap(), "false");
    }

    #[test]
    fn shallow_listing_has_no_content_or_children() {
        let (_, server) = server();
        let response = server.handle(&get("/list?recursive=false&full=false"));
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some(XML_CONTENT_TYPE));

        let listing = Listing::decode(response.body.as_ref().unwrap(), Some(XML_CONTENT_TYPE)).unwrap();
        assert_eq!(listing.path, "/");
        assert!(listing.manageable);
        let names: Vec<&str> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
        assert_eq!(listing.entries[0].size, Some(50));
        assert_eq!(listing.entries[0].path, "/a.txt");
        assert_eq!(listing.entries[1].content_type, DIRECTORY);
        assert!(listing
            .entries
            .iter()
            .all(|e| e.content.is_none() && e.children.is_none() && e.hash.is_none()));
    }

    #[test]
    fn recursive_full_listing_inlines_and_hashes() {
        let (root, _) = server();
        root.add_file("big.bin", "application/octet-stream", vec![7u8; 64]);
        let server = ResourceServer::with_config(
            root,
            ServerConfig::default().with_inline_threshold(64),
        );

        let response = server.handle(&get("/list/?recursive=true&full=true"));
        let listing = Listing::decode(response.body.as_ref().unwrap(), None).unwrap();

        let big = listing.entries.iter().find(|e| e.name == "big.bin").unwrap();
        assert!(big.content.is_none());
        assert_eq!(big.hash, Some(format!("{:x}", md5::compute(vec![7u8; 64]))));

        let sub = listing.entries.iter().find(|e| e.name == "sub").unwrap();
        let nested = sub.children.as_ref().unwrap();
        assert_eq!(nested.path, "/sub");
        assert_eq!(nested.entries[0].content.as_deref(), Some(&b"hello"[..]));
        assert_eq!(nested.entries[0].path, "/sub/b.txt");
    }

    #[test]
    fn json_listing_on_request() {
        let (_, server) = server();
        let request = get("/list/sub").with_header("Accept", "application/json");
        let response = server.handle(&request);
        assert_eq!(response.header("content-type"), Some(JSON_CONTENT_TYPE));
        let listing = Listing::decode(response.body.as_ref().unwrap(), Some(JSON_CONTENT_TYPE)).unwrap();
        assert_eq!(listing.entries.len(), 1);
    }

    #[test]
    fn read_returns_content_and_headers() {
        let (_, server) = server();
        let response = server.handle(&get("/resource/sub/b.txt"));
        assert_eq!(response.status, 200);
        assert_eq!(response.body_text().unwrap(), "hello");
        assert_eq!(response.header("content-length"), Some("5"));
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(
            response.header("content-disposition"),
            Some("attachment;filename=b.txt")
        );
        assert_eq!(response.header("x-resource-writable"), Some("true"));
    }

    #[test]
    fn read_failures_map_to_statuses() {
        let (_, server) = server();
        assert_eq!(server.handle(&get("/resource/missing")).status, 404);
        assert_eq!(server.handle(&get("/resource/sub")).status, 400);
        assert_eq!(server.handle(&get("/list/a.txt")).status, 400);
        assert_eq!(server.handle(&get("/list/missing")).status, 404);
        assert_eq!(server.handle(&get("/resource/%2E%2E/etc")).status, 400);
    }

    #[test]
    fn unknown_routes_and_methods() {
        let (_, server) = server();
        assert_eq!(server.handle(&get("/nothing/here")).status, 404);
        let request = HttpRequest::put("http://localhost/list/sub");
        assert_eq!(server.handle(&request).status, 405);
    }

    #[test]
    fn put_creates_parents_and_guesses_type() {
        let (root, server) = server();
        let request = HttpRequest::put("http://localhost/resource/new/dir/notes.md")
            .with_body("# notes");
        assert_eq!(server.handle(&request).status, 204);

        let root: ResourceRef = root;
        let resolved = resolve(&root, &ResourcePath::parse("/new/dir/notes.md").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.resource.content_type(), "text/markdown");
        assert_eq!(read_all(resolved.resource.as_readable().unwrap()).unwrap(), b"# notes");
    }

    #[test]
    fn put_uses_specific_content_type() {
        let (root, server) = server();
        let request = HttpRequest::put("http://localhost/resource/data")
            .with_header("Content-Type", "application/json")
            .with_body("{}");
        assert_eq!(server.handle(&request).status, 204);
        assert_eq!(
            root.child("data").unwrap().unwrap().content_type(),
            "application/json"
        );
    }

    #[test]
    fn post_creates_children() {
        let (root, server) = server();
        let request = HttpRequest::post("http://localhost/resource")
            .with_query("name", "docs")
            .with_query("type", DIRECTORY);
        assert_eq!(server.handle(&request).status, 201);
        assert!(root.child("docs").unwrap().unwrap().is_container());

        let request = HttpRequest::post("http://localhost/resource/docs").with_query("name", "blob");
        assert_eq!(server.handle(&request).status, 201);

        // Duplicate name, missing name, item as parent.
        let duplicate = HttpRequest::post("http://localhost/resource").with_query("name", "docs");
        assert_eq!(server.handle(&duplicate).status, 400);
        assert_eq!(server.handle(&HttpRequest::post("http://localhost/resource")).status, 400);
        let on_item = HttpRequest::post("http://localhost/resource/a.txt").with_query("name", "x");
        assert_eq!(server.handle(&on_item).status, 400);
    }

    #[test]
    fn delete_rules() {
        let (root, server) = server();
        assert_eq!(
            server.handle(&HttpRequest::delete("http://localhost/resource/sub")).status,
            204
        );
        assert!(root.child("sub").unwrap().is_none());
        assert_eq!(
            server.handle(&HttpRequest::delete("http://localhost/resource/sub")).status,
            404
        );
        assert_eq!(
            server.handle(&HttpRequest::delete("http://localhost/resource")).status,
            400
        );

        root.set_writable(false);
        assert_eq!(
            server.handle(&HttpRequest::delete("http://localhost/resource/a.txt")).status,
            400
        );
    }

    #[test]
    fn mount_prefix_is_honored() {
        let (root, _) = server();
        let server = ResourceServer::with_config(root, ServerConfig::default().with_mount("/api/"));
        assert_eq!(server.handle(&get("/api/exists/a.txt")).body_text().unwrap(), "true");
        assert_eq!(server.handle(&get("/exists/a.txt")).status, 404);
        assert_eq!(server.handle(&get("/apifoo/exists")).status, 404);
    }

    #[test]
    fn split_url_handles_relative_and_absolute() {
        assert_eq!(split_url("http://h:1/list/a?full=true"), ("/list/a", "full=true"));
        assert_eq!(split_url("http://h"), ("/", ""));
        assert_eq!(split_url("/exists"), ("/exists", ""));
    }
}
