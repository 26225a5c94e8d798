//! Capability traits shared by local and remote resource trees.
//!
//! A resource is a node with a name and a content type. What else it can do
//! is discovered through the `as_*` accessors: a container lists children,
//! a manageable container also creates and deletes them, a readable resource
//! hands out its bytes and a writable one accepts new bytes.

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::Error;

/// Content type that marks a resource as a directory.
pub const DIRECTORY: &str = "application/directory";

/// Content type used when a resource does not report one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared handle to a resource in any tree.
pub type ResourceRef = Arc<dyn Resource>;

/// A node in a resource tree.
///
/// # Object Safety
///
/// This trait is object-safe: trees hand out `Arc<dyn Resource>`.
pub trait Resource: Send + Sync {
    /// Name of the resource inside its parent. Empty for a tree root.
    fn name(&self) -> &str;

    /// MIME type of the resource, [`DIRECTORY`] for containers.
    fn content_type(&self) -> &str;

    /// Last modification time, if the tree tracks one.
    fn last_modified(&self) -> Option<DateTime<Utc>> {
        None
    }

    /// Size in bytes, if it can be established without reading the content.
    fn size(&self) -> Option<u64> {
        None
    }

    fn as_container(&self) -> Option<&dyn Container> {
        None
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        None
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        None
    }

    /// Whether this resource is a directory-like container.
    fn is_container(&self) -> bool {
        self.as_container().is_some()
    }
}

/// A resource that can enumerate its children.
pub trait Container: Send + Sync {
    /// All children, in no particular order.
    fn children(&self) -> Result<Vec<ResourceRef>, Error>;

    /// Look up a direct child by name.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No child of that name exists.
    /// * `Ok(Some(child))` - The child.
    fn child(&self, name: &str) -> Result<Option<ResourceRef>, Error>;

    fn as_manageable(&self) -> Option<&dyn Manageable> {
        None
    }
}

/// A container that can create and delete children.
pub trait Manageable: Send + Sync {
    /// Create a child. A `content_type` of [`DIRECTORY`] creates a container.
    fn create(&self, name: &str, content_type: &str) -> Result<ResourceRef, Error>;

    /// Delete a child and everything below it.
    fn delete(&self, name: &str) -> Result<(), Error>;
}

/// A resource whose bytes can be read.
pub trait Readable: Send + Sync {
    fn reader(&self) -> Result<Box<dyn io::Read + Send>, Error>;
}

/// A resource whose bytes can be replaced.
pub trait Writable: Send + Sync {
    /// Open a sink that replaces the content once closed.
    fn writer(&self) -> Result<Box<dyn ResourceWriter>, Error>;
}

/// Sink returned by [`Writable::writer`].
///
/// Bytes are only guaranteed to reach the resource once `close` returns
/// `Ok`. Closing twice is a no-op.
pub trait ResourceWriter: io::Write + Send {
    fn close(&mut self) -> Result<(), Error>;
}

/// Read the whole content of a readable resource.
pub fn read_all(readable: &dyn Readable) -> Result<Vec<u8>, Error> {
    let mut reader = readable.reader()?;
    let mut buffer = Vec::new();
    io::Read::read_to_end(&mut reader, &mut buffer)?;
    Ok(buffer)
}

/// Replace the content of a writable resource with `data`.
pub fn write_all(writable: &dyn Writable, data: &[u8]) -> Result<(), Error> {
    let mut writer = writable.writer()?;
    io::Write::write_all(&mut writer, data)?;
    writer.close()
}
