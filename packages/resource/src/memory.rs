//! In-memory resource tree.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};

use crate::traits::{
    Container, Manageable, Readable, Resource, ResourceRef, ResourceWriter, Writable, DIRECTORY,
};
use crate::{Capability, Error};

enum Node {
    Directory(RwLock<BTreeMap<String, Arc<MemoryResource>>>),
    File(RwLock<Bytes>),
}

/// A resource tree held entirely in memory.
///
/// Useful as a server root in tests and for trees that are assembled by the
/// program itself. Every node carries a writability flag: a non-writable
/// directory is listable but not manageable, a non-writable file is
/// readable only.
///
/// # Example
///
/// ```rust
/// use remotefs_resource::{MemoryResource, Resource};
///
/// let root = MemoryResource::directory("");
/// let docs = root.add_directory("docs");
/// docs.add_file("readme.txt", "text/plain", b"hello".to_vec());
///
/// let listing = root.as_container().unwrap().children().unwrap();
/// assert_eq!(listing.len(), 1);
/// ```
pub struct MemoryResource {
    this: Weak<MemoryResource>,
    name: String,
    content_type: String,
    writable: AtomicBool,
    modified: RwLock<DateTime<Utc>>,
    node: Node,
}

impl MemoryResource {
    fn new(name: &str, content_type: &str, node: Node) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            writable: AtomicBool::new(true),
            modified: RwLock::new(Utc::now()),
            node,
        })
    }

    /// Create a detached, empty directory. Use an empty name for a tree root.
    pub fn directory(name: &str) -> Arc<Self> {
        Self::new(name, DIRECTORY, Node::Directory(RwLock::new(BTreeMap::new())))
    }

    /// Create a detached file.
    pub fn file(name: &str, content_type: &str, data: impl Into<Bytes>) -> Arc<Self> {
        Self::new(name, content_type, Node::File(RwLock::new(data.into())))
    }

    /// Insert `child` into this directory, replacing any child of the same name.
    ///
    /// Does nothing when called on a file.
    pub fn add(&self, child: Arc<MemoryResource>) -> Arc<MemoryResource> {
        if let Node::Directory(children) = &self.node {
            children
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(child.name.clone(), Arc::clone(&child));
        }
        child
    }

    pub fn add_directory(&self, name: &str) -> Arc<MemoryResource> {
        self.add(Self::directory(name))
    }

    pub fn add_file(
        &self,
        name: &str,
        content_type: &str,
        data: impl Into<Bytes>,
    ) -> Arc<MemoryResource> {
        self.add(Self::file(name, content_type, data))
    }

    /// Toggle writability (manageability for directories).
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    pub fn is_writable(&self) -> bool {
        self.writable.load(Ordering::SeqCst)
    }

    /// Current content of a file, `None` for directories.
    pub fn data(&self) -> Option<Bytes> {
        match &self.node {
            Node::File(data) => Some(data.read().unwrap_or_else(PoisonError::into_inner).clone()),
            Node::Directory(_) => None,
        }
    }

    fn replace(&self, data: Bytes) {
        if let Node::File(current) = &self.node {
            *current.write().unwrap_or_else(PoisonError::into_inner) = data;
            *self.modified.write().unwrap_or_else(PoisonError::into_inner) = Utc::now();
        }
    }

    fn touch(&self) {
        *self.modified.write().unwrap_or_else(PoisonError::into_inner) = Utc::now();
    }
}

impl Resource for MemoryResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        Some(*self.modified.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn size(&self) -> Option<u64> {
        self.data().map(|data| data.len() as u64)
    }

    fn as_container(&self) -> Option<&dyn Container> {
        match self.node {
            Node::Directory(_) => Some(self),
            Node::File(_) => None,
        }
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        match self.node {
            Node::File(_) => Some(self),
            Node::Directory(_) => None,
        }
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        match self.node {
            Node::File(_) if self.is_writable() => Some(self),
            _ => None,
        }
    }
}

impl Container for MemoryResource {
    fn children(&self) -> Result<Vec<ResourceRef>, Error> {
        match &self.node {
            Node::Directory(children) => Ok(children
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .values()
                .map(|child| Arc::clone(child) as ResourceRef)
                .collect()),
            Node::File(_) => Err(Error::not_capable(&self.name, Capability::Listable)),
        }
    }

    fn child(&self, name: &str) -> Result<Option<ResourceRef>, Error> {
        match &self.node {
            Node::Directory(children) => Ok(children
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .map(|child| Arc::clone(child) as ResourceRef)),
            Node::File(_) => Err(Error::not_capable(&self.name, Capability::Listable)),
        }
    }

    fn as_manageable(&self) -> Option<&dyn Manageable> {
        if self.is_writable() {
            Some(self)
        } else {
            None
        }
    }
}

impl Manageable for MemoryResource {
    fn create(&self, name: &str, content_type: &str) -> Result<ResourceRef, Error> {
        crate::ResourcePath::validate_name(name)?;
        let Node::Directory(children) = &self.node else {
            return Err(Error::not_capable(&self.name, Capability::Manageable));
        };

        let mut children = children.write().unwrap_or_else(PoisonError::into_inner);
        if children.contains_key(name) {
            return Err(Error::AlreadyExists {
                path: name.to_string(),
            });
        }

        let child = if content_type == DIRECTORY {
            Self::directory(name)
        } else {
            Self::file(name, content_type, Bytes::new())
        };
        children.insert(name.to_string(), Arc::clone(&child));
        drop(children);
        self.touch();
        Ok(child)
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        let Node::Directory(children) = &self.node else {
            return Err(Error::not_capable(&self.name, Capability::Manageable));
        };

        let removed = children
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(_) => {
                self.touch();
                Ok(())
            }
            None => Err(Error::NotFound {
                path: name.to_string(),
            }),
        }
    }
}

impl Readable for MemoryResource {
    fn reader(&self) -> Result<Box<dyn io::Read + Send>, Error> {
        let data = self
            .data()
            .ok_or_else(|| Error::not_capable(&self.name, Capability::Readable))?;
        Ok(Box::new(data.reader()))
    }
}

impl Writable for MemoryResource {
    fn writer(&self) -> Result<Box<dyn ResourceWriter>, Error> {
        let target = self
            .this
            .upgrade()
            .ok_or_else(|| Error::not_capable(&self.name, Capability::Writable))?;
        Ok(Box::new(MemoryWriter {
            target,
            buffer: Vec::new(),
            closed: false,
        }))
    }
}

struct MemoryWriter {
    target: Arc<MemoryResource>,
    buffer: Vec<u8>,
    closed: bool,
}

impl io::Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::other("writer is closed"));
        }
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ResourceWriter for MemoryWriter {
    fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.closed = true;
            self.target
                .replace(Bytes::from(std::mem::take(&mut self.buffer)));
        }
        Ok(())
    }
}
