use std::io;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};
use remotefs_resource::{
    Capability, Error as ResourceError, Readable, Resource, ResourcePath, ResourceWriter, Writable,
};

use super::connection::Connection;
use super::NodeInfo;
use crate::types::HttpRequest;
use crate::Error;

#[derive(Default)]
struct ItemState {
    size: Option<u64>,
    content: Option<Bytes>,
    hash: Option<String>,
}

/// A remote file.
///
/// Content is looked up in memory, then in the disk cache (when both a
/// cache directory and a content hash are known), then fetched from the
/// server. Whenever `content` is present, `size` equals its length.
pub struct RemoteItem {
    pub(crate) info: NodeInfo,
    this: Weak<RemoteItem>,
    writable: bool,
    state: RwLock<ItemState>,
}

impl RemoteItem {
    pub(crate) fn new(
        info: NodeInfo,
        writable: bool,
        size: Option<u64>,
        content: Option<Bytes>,
        hash: Option<String>,
    ) -> Arc<Self> {
        let size = content.as_ref().map(|c| c.len() as u64).or(size);
        Arc::new_cyclic(|this| Self {
            info,
            this: this.clone(),
            writable,
            state: RwLock::new(ItemState {
                size,
                content,
                hash,
            }),
        })
    }

    /// A freshly created, empty item.
    pub(crate) fn placeholder(info: NodeInfo) -> Arc<Self> {
        Self::new(info, true, Some(0), Some(Bytes::new()), None)
    }

    fn state(&self) -> RwLockReadGuard<'_, ItemState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, ItemState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
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

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Content hash reported by the server or computed after a write.
    pub fn hash(&self) -> Option<String> {
        self.state().hash.clone()
    }

    /// Whether the content is held in memory.
    pub fn is_loaded(&self) -> bool {
        self.state().content.is_some()
    }

    /// The whole content of the item.
    pub fn read(&self) -> Result<Bytes, Error> {
        if let Some(content) = self.state().content.clone() {
            return Ok(content);
        }

        let connection = self.info.connection()?;
        let cache = connection.disk_cache();
        let hash = self.hash();
        if let (Some(cache), Some(hash)) = (&cache, &hash) {
            if let Some(content) = cache.load(hash) {
                self.remember(content.clone());
                return Ok(content);
            }
        }

        let url = connection.endpoint("resource", &self.info.path);
        let (_, content) = connection.fetch(HttpRequest::get(url))?;
        self.remember(content.clone());
        if let (Some(cache), Some(hash)) = (&cache, &hash) {
            cache.store(hash, &content);
        }
        Ok(content)
    }

    /// Open a sink that replaces the content when closed.
    pub fn writer(&self) -> Result<ItemWriter, Error> {
        if !self.writable {
            return Err(Error::not_capable(&self.info.path, Capability::Writable));
        }
        let target = self.this.upgrade().ok_or_else(|| Error::Detached {
            path: self.info.path.to_string(),
        })?;
        Ok(ItemWriter {
            target,
            buffer: Vec::new(),
            closed: false,
        })
    }

    /// Drop the in-memory content. The disk cache is left alone.
    pub fn reset_cache(&self) {
        let mut state = self.state_mut();
        state.content = None;
        state.size = Some(0);
    }

    fn remember(&self, content: Bytes) {
        let mut state = self.state_mut();
        state.size = Some(content.len() as u64);
        state.content = Some(content);
    }

    fn persist(&self, content: Bytes) -> Result<(), Error> {
        let connection = self.info.connection()?;
        let request = HttpRequest::put(connection.endpoint("resource", &self.info.path))
            .with_header("Content-Type", self.info.content_type.clone())
            .with_header("Content-Length", content.len().to_string())
            .with_body(content.clone());

        let Some(write_back) = connection.write_back() else {
            connection.send(request)?;
            self.apply(&connection, content);
            return Ok(());
        };

        self.apply(&connection, content);
        let path = self.info.path.to_string();
        let background = Arc::clone(&connection);
        write_back.submit(Box::new(move || {
            if let Err(err) = background.send(request) {
                tracing::error!(path = %path, error = %err, "deferred write failed");
            }
        }));
        Ok(())
    }

    fn apply(&self, connection: &Connection, content: Bytes) {
        let hash = format!("{:x}", md5::compute(&content));
        if let Some(cache) = connection.disk_cache() {
            cache.store(&hash, &content);
        }
        let mut state = self.state_mut();
        state.size = Some(content.len() as u64);
        state.content = Some(content);
        state.hash = Some(hash);
    }
}

/// Buffered sink returned by [`RemoteItem::writer`].
///
/// Nothing reaches the item until [`close`](ResourceWriter::close).
pub struct ItemWriter {
    target: Arc<RemoteItem>,
    buffer: Vec<u8>,
    closed: bool,
}

impl ItemWriter {
    /// Send the buffered bytes. Closing again does nothing.
    pub fn finish(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let content = Bytes::from(std::mem::take(&mut self.buffer));
        self.target.persist(content)
    }
}

impl io::Write for ItemWriter {
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

impl ResourceWriter for ItemWriter {
    fn close(&mut self) -> Result<(), ResourceError> {
        Ok(self.finish()?)
    }
}

impl Drop for ItemWriter {
    fn drop(&mut self) {
        if !self.closed && !self.buffer.is_empty() {
            tracing::warn!(
                path = %self.target.info.path,
                bytes = self.buffer.len(),
                "writer dropped without close, discarding buffered bytes"
            );
        }
    }
}

impl Resource for RemoteItem {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn content_type(&self) -> &str {
        &self.info.content_type
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.info.last_modified
    }

    fn size(&self) -> Option<u64> {
        self.state().size
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        Some(self)
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        if self.writable {
            Some(self)
        } else {
            None
        }
    }
}

impl Readable for RemoteItem {
    fn reader(&self) -> Result<Box<dyn io::Read + Send>, ResourceError> {
        Ok(Box::new(self.read()?.reader()))
    }
}

impl Writable for RemoteItem {
    fn writer(&self) -> Result<Box<dyn ResourceWriter>, ResourceError> {
        Ok(Box::new(RemoteItem::writer(self)?))
    }
}
