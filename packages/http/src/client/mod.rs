//! Client side: a lazily fetched mirror of a remote resource tree.
//!
//! The root [`RemoteContainer`] owns the [`Connection`]. Every other node
//! reaches it by walking weak parent links, so the tree never holds a
//! reference cycle and settings changed on the connection apply to the
//! whole tree.

mod connection;
mod container;
mod item;

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use remotefs_resource::{ResourcePath, ResourceRef};

pub use connection::Connection;
pub use container::{ChildMap, RemoteContainer};
pub use item::{ItemWriter, RemoteItem};

use crate::Error;

/// A node of the client tree.
#[derive(Clone)]
pub enum RemoteResource {
    Container(Arc<RemoteContainer>),
    Item(Arc<RemoteItem>),
}

impl RemoteResource {
    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn path(&self) -> &ResourcePath {
        &self.info().path
    }

    pub fn content_type(&self) -> &str {
        &self.info().content_type
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.info().last_modified
    }

    /// `remote[s]://host[:port]/prefix/path` of this node.
    pub fn uri(&self) -> Result<String, Error> {
        self.info().uri()
    }

    pub fn as_container(&self) -> Option<&Arc<RemoteContainer>> {
        match self {
            RemoteResource::Container(container) => Some(container),
            RemoteResource::Item(_) => None,
        }
    }

    pub fn as_item(&self) -> Option<&Arc<RemoteItem>> {
        match self {
            RemoteResource::Item(item) => Some(item),
            RemoteResource::Container(_) => None,
        }
    }

    pub fn reset_cache(&self) {
        match self {
            RemoteResource::Container(container) => container.reset_cache(),
            RemoteResource::Item(item) => item.reset_cache(),
        }
    }

    /// Type-erased handle for code written against the resource traits.
    pub fn to_resource(&self) -> ResourceRef {
        match self {
            RemoteResource::Container(container) => Arc::clone(container) as ResourceRef,
            RemoteResource::Item(item) => Arc::clone(item) as ResourceRef,
        }
    }

    fn info(&self) -> &NodeInfo {
        match self {
            RemoteResource::Container(container) => &container.info,
            RemoteResource::Item(item) => &item.info,
        }
    }
}

impl std::fmt::Debug for RemoteResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            RemoteResource::Container(_) => "Container",
            RemoteResource::Item(_) => "Item",
        };
        f.debug_struct(kind)
            .field("path", &self.path().to_string())
            .field("content_type", &self.content_type())
            .finish()
    }
}

/// Identity shared by containers and items.
pub(crate) struct NodeInfo {
    pub(crate) name: String,
    pub(crate) path: ResourcePath,
    pub(crate) content_type: String,
    pub(crate) last_modified: Option<DateTime<Utc>>,
    pub(crate) parent: Weak<RemoteContainer>,
    /// Only set on the tree root.
    pub(crate) connection: Option<Arc<Connection>>,
}

impl NodeInfo {
    pub(crate) fn connection(&self) -> Result<Arc<Connection>, Error> {
        if let Some(connection) = &self.connection {
            return Ok(Arc::clone(connection));
        }
        match self.parent.upgrade() {
            Some(parent) => parent.info.connection(),
            None => Err(Error::Detached {
                path: self.path.to_string(),
            }),
        }
    }

    pub(crate) fn uri(&self) -> Result<String, Error> {
        let connection = self.connection()?;
        let base = connection.base_url();
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("remotes://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("remote://{rest}")
        } else {
            base.to_string()
        };
        Ok(format!("{}{}", base.trim_end_matches('/'), self.path))
    }
}
