//! Resource tree backed by a directory on the local filesystem.

use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::content_type::guess_content_type;
use crate::traits::{
    Container, Manageable, Readable, Resource, ResourceRef, ResourceWriter, Writable, DIRECTORY,
};
use crate::{Capability, Error, ResourcePath};

/// A file or directory on disk, exposed as a resource.
///
/// Nodes are cheap views over a filesystem path: metadata (size, timestamps)
/// is read from disk on every call, so the tree always reflects the current
/// state of the directory. A tree opened with [`LocalResource::open_read_only`]
/// is listable and readable but neither manageable nor writable.
pub struct LocalResource {
    name: String,
    path: PathBuf,
    content_type: String,
    is_dir: bool,
    read_only: bool,
}

impl LocalResource {
    /// Open `root` as the root of a writable tree.
    pub fn open(root: impl Into<PathBuf>) -> Result<Arc<Self>, Error> {
        Self::open_root(root.into(), false)
    }

    /// Open `root` as the root of a read-only tree.
    pub fn open_read_only(root: impl Into<PathBuf>) -> Result<Arc<Self>, Error> {
        Self::open_root(root.into(), true)
    }

    fn open_root(root: PathBuf, read_only: bool) -> Result<Arc<Self>, Error> {
        let attr = fs::metadata(&root)?;
        if !attr.is_dir() {
            return Err(Error::not_capable(root.display(), Capability::Listable));
        }
        let root = root.canonicalize()?;
        Ok(Self::node(String::new(), root, true, read_only))
    }

    fn node(name: String, path: PathBuf, is_dir: bool, read_only: bool) -> Arc<Self> {
        let content_type = if is_dir {
            DIRECTORY.to_string()
        } else {
            guess_content_type(&name).to_string()
        };
        Arc::new(Self {
            name,
            path,
            content_type,
            is_dir,
            read_only,
        })
    }

    fn load(&self, name: &str) -> Result<Option<Arc<Self>>, Error> {
        let path = self.path.join(name);
        match fs::metadata(&path) {
            Ok(attr) => Ok(Some(Self::node(
                name.to_string(),
                path,
                attr.is_dir(),
                self.read_only,
            ))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Location of this resource on disk.
    pub fn fs_path(&self) -> &FsPath {
        &self.path
    }
}

impl Resource for LocalResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        let modified = fs::metadata(&self.path).and_then(|m| m.modified()).ok()?;
        Some(DateTime::<Utc>::from(modified))
    }

    fn size(&self) -> Option<u64> {
        if self.is_dir {
            return None;
        }
        fs::metadata(&self.path).map(|m| m.len()).ok()
    }

    fn as_container(&self) -> Option<&dyn Container> {
        if self.is_dir {
            Some(self)
        } else {
            None
        }
    }

    fn as_readable(&self) -> Option<&dyn Readable> {
        if self.is_dir {
            None
        } else {
            Some(self)
        }
    }

    fn as_writable(&self) -> Option<&dyn Writable> {
        if self.is_dir || self.read_only {
            None
        } else {
            Some(self)
        }
    }
}

impl Container for LocalResource {
    fn children(&self) -> Result<Vec<ResourceRef>, Error> {
        let mut children = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                tracing::debug!(path = %entry.path().display(), "skipping non UTF-8 file name");
                continue;
            };
            if let Some(child) = self.load(&name)? {
                children.push(child as ResourceRef);
            }
        }
        Ok(children)
    }

    fn child(&self, name: &str) -> Result<Option<ResourceRef>, Error> {
        ResourcePath::validate_name(name)?;
        Ok(self.load(name)?.map(|child| child as ResourceRef))
    }

    fn as_manageable(&self) -> Option<&dyn Manageable> {
        if self.read_only {
            None
        } else {
            Some(self)
        }
    }
}

impl Manageable for LocalResource {
    fn create(&self, name: &str, content_type: &str) -> Result<ResourceRef, Error> {
        ResourcePath::validate_name(name)?;
        let path = self.path.join(name);
        tracing::debug!(path = %path.display(), content_type, "creating local resource");

        let created = if content_type == DIRECTORY {
            fs::create_dir(&path)
        } else {
            File::create_new(&path).map(|_| ())
        };
        match created {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::AlreadyExists {
                    path: path.display().to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        }

        let child = Self::node(
            name.to_string(),
            path,
            content_type == DIRECTORY,
            self.read_only,
        );
        Ok(child)
    }

    fn delete(&self, name: &str) -> Result<(), Error> {
        ResourcePath::validate_name(name)?;
        let path = self.path.join(name);
        let attr = match fs::symlink_metadata(&path) {
            Ok(attr) => attr,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound {
                    path: path.display().to_string(),
                })
            }
            Err(err) => return Err(err.into()),
        };

        tracing::debug!(path = %path.display(), "deleting local resource");
        if attr.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

impl Readable for LocalResource {
    fn reader(&self) -> Result<Box<dyn io::Read + Send>, Error> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }
}

impl Writable for LocalResource {
    fn writer(&self) -> Result<Box<dyn ResourceWriter>, Error> {
        if self.read_only {
            return Err(Error::not_capable(self.path.display(), Capability::Writable));
        }
        Ok(Box::new(LocalWriter {
            path: self.path.clone(),
            buffer: Vec::new(),
            closed: false,
        }))
    }
}

/// Buffers the new content and replaces the file on close.
struct LocalWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    closed: bool,
}

impl io::Write for LocalWriter {
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

impl ResourceWriter for LocalWriter {
    fn close(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!(path = %self.path.display(), bytes = self.buffer.len(), "writing local resource");
        fs::write(&self.path, &self.buffer)?;
        self.buffer = Vec::new();
        Ok(())
    }
}
