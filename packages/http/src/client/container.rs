use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::Utc;
use remotefs_resource::{
    Capability, Container, Error as ResourceError, Manageable, Resource, ResourcePath,
    ResourceRef, DIRECTORY,
};

use super::connection::Connection;
use super::item::RemoteItem;
use super::{NodeInfo, RemoteResource};
use crate::config::RemoteConfig;
use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::listing::{Entry, Listing};
use crate::types::{HttpRequest, Method};
use crate::Error;

/// Children of a container, keyed by name.
pub type ChildMap = BTreeMap<String, RemoteResource>;

#[derive(Debug, Clone, Copy)]
struct ListingMode {
    recursive: bool,
    full: bool,
}

/// A remote directory.
///
/// The child map is fetched on first access and kept until
/// [`reset_cache`](RemoteContainer::reset_cache). Concurrent first accesses
/// share a single request and observe the same map.
pub struct RemoteContainer {
    pub(crate) info: NodeInfo,
    this: Weak<RemoteContainer>,
    manageable: AtomicBool,
    mode: ListingMode,
    children: Mutex<Option<Arc<ChildMap>>>,
}

impl RemoteContainer {
    /// Open the tree described by `config` over HTTP.
    pub fn connect(config: &RemoteConfig) -> Result<Arc<Self>, Error> {
        let transport = ReqwestExecutor::new(config.timeout)?;
        Ok(Self::open(Arc::new(transport), config))
    }

    /// Open the tree described by `config` over any transport.
    pub fn open(transport: Arc<dyn HttpExecutor>, config: &RemoteConfig) -> Arc<Self> {
        let connection = Arc::new(Connection::new(transport, config));
        tracing::debug!(base_url = connection.base_url(), "opening remote tree");
        let info = NodeInfo {
            name: String::new(),
            path: ResourcePath::root(),
            content_type: DIRECTORY.to_string(),
            last_modified: None,
            parent: Weak::new(),
            connection: Some(connection),
        };
        let mode = ListingMode {
            recursive: config.recursive,
            full: config.full,
        };
        Self::new(info, true, mode)
    }

    fn new(info: NodeInfo, manageable: bool, mode: ListingMode) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            info,
            this: this.clone(),
            manageable: AtomicBool::new(manageable),
            mode,
            children: Mutex::new(None),
        })
    }

    fn child_info(&self, name: &str, content_type: &str) -> Result<NodeInfo, Error> {
        let path = self.info.path.child(name).map_err(ResourceError::from)?;
        Ok(NodeInfo {
            name: name.to_string(),
            path,
            content_type: content_type.to_string(),
            last_modified: None,
            parent: self.this.clone(),
            connection: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn path(&self) -> &ResourcePath {
        &self.info.path
    }

    pub fn uri(&self) -> Result<String, Error> {
        self.info.uri()
    }

    /// Shared connection of the tree this container belongs to.
    pub fn connection(&self) -> Result<Arc<Connection>, Error> {
        self.info.connection()
    }

    pub fn is_recursive(&self) -> bool {
        self.mode.recursive
    }

    pub fn is_full(&self) -> bool {
        self.mode.full
    }

    /// Whether children can be created and deleted. Refreshed from the
    /// server's answer each time the listing is fetched.
    pub fn is_manageable(&self) -> bool {
        self.manageable.load(Ordering::SeqCst)
    }

    /// Whether the current generation of the child map has been fetched.
    pub fn is_populated(&self) -> bool {
        self.slot().is_some()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Arc<ChildMap>>> {
        self.children.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The child map, fetched from the server on first use.
    pub fn children(&self) -> Result<Arc<ChildMap>, Error> {
        let mut slot = self.slot();
        if let Some(children) = slot.as_ref() {
            return Ok(Arc::clone(children));
        }

        let listing = self.fetch_listing()?;
        let children = Arc::new(self.load_listing(&listing));
        *slot = Some(Arc::clone(&children));
        Ok(children)
    }

    pub fn child(&self, name: &str) -> Result<Option<RemoteResource>, Error> {
        Ok(self.children()?.get(name).cloned())
    }

    /// Walk `path` down from this container. `Ok(None)` when a segment is
    /// missing or an item sits where a container is needed.
    pub fn resolve(&self, path: &ResourcePath) -> Result<Option<RemoteResource>, Error> {
        let Some(this) = self.this.upgrade() else {
            return Err(Error::Detached {
                path: self.info.path.to_string(),
            });
        };
        let mut current = RemoteResource::Container(this);
        for name in path.iter() {
            let next = match &current {
                RemoteResource::Container(container) => container.child(name)?,
                RemoteResource::Item(_) => return Ok(None),
            };
            match next {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Ask the server whether this container still exists.
    pub fn exists(&self) -> Result<bool, Error> {
        let connection = self.info.connection()?;
        let url = connection.endpoint("exists", &self.info.path);
        let (_, body) = connection.fetch(HttpRequest::get(url))?;
        Ok(String::from_utf8_lossy(&body).trim() == "true")
    }

    fn fetch_listing(&self) -> Result<Listing, Error> {
        let connection = self.info.connection()?;
        let request = HttpRequest::get(connection.endpoint("list", &self.info.path))
            .with_query("recursive", self.mode.recursive)
            .with_query("full", self.mode.full);
        let url = request.full_url();

        tracing::debug!(path = %self.info.path, recursive = self.mode.recursive, full = self.mode.full, "fetching listing");
        let (response, body) = connection.fetch(request)?;
        Listing::decode(&body, response.header("content-type")).map_err(|source| Error::Request {
            method: Method::GET,
            url,
            source: Box::new(source),
        })
    }

    fn load_listing(&self, listing: &Listing) -> ChildMap {
        self.manageable.store(listing.manageable, Ordering::SeqCst);

        let mut children = ChildMap::new();
        for entry in &listing.entries {
            match self.load_entry(entry) {
                Ok(child) => {
                    children.insert(entry.name.clone(), child);
                }
                Err(err) => {
                    tracing::warn!(name = %entry.name, error = %err, "skipping invalid listing entry")
                }
            }
        }
        children
    }

    fn load_entry(&self, entry: &Entry) -> Result<RemoteResource, Error> {
        let mut info = self.child_info(&entry.name, &entry.content_type)?;
        info.last_modified = entry.last_modified;

        if entry.is_container() {
            let container = Self::new(info, entry.writable, self.mode);
            if self.mode.recursive {
                if let Some(nested) = &entry.children {
                    let children = container.load_listing(nested);
                    *container.slot() = Some(Arc::new(children));
                }
            }
            Ok(RemoteResource::Container(container))
        } else {
            let item = RemoteItem::new(
                info,
                entry.writable,
                entry.size,
                entry.content.clone(),
                entry.hash.clone(),
            );
            Ok(RemoteResource::Item(item))
        }
    }

    /// Create a child on the server and add a placeholder for it locally.
    ///
    /// The listing is fetched first so that manageability and name clashes
    /// are known before anything is sent.
    ///
    /// The placeholder only carries what the caller asked for; the server's
    /// view of the new resource is fetched lazily.
    pub fn create(&self, name: &str, content_type: &str) -> Result<RemoteResource, Error> {
        let children = self.children()?;
        if !self.is_manageable() {
            return Err(Error::not_capable(&self.info.path, Capability::Manageable));
        }
        let mut info = self.child_info(name, content_type)?;
        if children.contains_key(name) {
            return Err(Error::AlreadyExists {
                path: self.info.path.to_string(),
                name: name.to_string(),
            });
        }

        let connection = self.info.connection()?;
        // The root collection is addressed without a trailing separator.
        let url = if self.info.path.is_root() {
            format!("{}resource", connection.base_url())
        } else {
            connection.endpoint("resource", &self.info.path)
        };
        let request = HttpRequest::post(url)
            .with_query("type", content_type)
            .with_query("name", name);
        connection.send(request)?;

        info.last_modified = Some(Utc::now());
        let child = if content_type == DIRECTORY {
            let container = Self::new(info, true, self.mode);
            RemoteResource::Container(container)
        } else {
            RemoteResource::Item(RemoteItem::placeholder(info))
        };

        if let Some(children) = self.slot().as_mut() {
            Arc::make_mut(children).insert(name.to_string(), child.clone());
        }
        Ok(child)
    }

    /// Delete a child on the server. Names absent from the local map are
    /// ignored without a request.
    pub fn delete(&self, name: &str) -> Result<(), Error> {
        let children = self.children()?;
        if !self.is_manageable() {
            return Err(Error::not_capable(&self.info.path, Capability::Manageable));
        }
        if !children.contains_key(name) {
            tracing::debug!(path = %self.info.path, name, "nothing to delete");
            return Ok(());
        }

        let connection = self.info.connection()?;
        let path = self.info.path.child(name).map_err(ResourceError::from)?;
        connection.send(HttpRequest::delete(connection.endpoint("resource", &path)))?;

        if let Some(children) = self.slot().as_mut() {
            Arc::make_mut(children).remove(name);
        }
        Ok(())
    }

    /// Forget the child map so the next access refetches it. Suppressed
    /// while writes are deferred, since local state may be ahead of the
    /// server.
    pub fn reset_cache(&self) {
        let deferred = self
            .info
            .connection()
            .map(|connection| connection.write_back().is_some())
            .unwrap_or(false);
        if deferred {
            tracing::debug!(path = %self.info.path, "cache reset suppressed while writes are deferred");
            return;
        }
        self.slot().take();
    }
}

impl Resource for RemoteContainer {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn content_type(&self) -> &str {
        &self.info.content_type
    }

    fn last_modified(&self) -> Option<chrono::DateTime<Utc>> {
        self.info.last_modified
    }

    fn as_container(&self) -> Option<&dyn Container> {
        Some(self)
    }
}

impl Container for RemoteContainer {
    fn children(&self) -> Result<Vec<ResourceRef>, ResourceError> {
        let children = RemoteContainer::children(self)?;
        Ok(children.values().map(RemoteResource::to_resource).collect())
    }

    fn child(&self, name: &str) -> Result<Option<ResourceRef>, ResourceError> {
        let child = RemoteContainer::child(self, name)?;
        Ok(child.as_ref().map(RemoteResource::to_resource))
    }

    fn as_manageable(&self) -> Option<&dyn Manageable> {
        if self.is_manageable() {
            Some(self)
        } else {
            None
        }
    }
}

impl Manageable for RemoteContainer {
    fn create(&self, name: &str, content_type: &str) -> Result<ResourceRef, ResourceError> {
        let child = RemoteContainer::create(self, name, content_type)?;
        Ok(child.to_resource())
    }

    fn delete(&self, name: &str) -> Result<(), ResourceError> {
        Ok(RemoteContainer::delete(self, name)?)
    }
}
