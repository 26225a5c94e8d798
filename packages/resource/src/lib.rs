//! # remotefs-resource
//!
//! Resource tree abstraction shared by the remotefs client and server.
//!
//! A tree is made of [`Resource`] nodes. Optional capabilities are exposed
//! through accessors rather than a type hierarchy:
//!
//! - [`Container`]: lists children (`as_container`)
//! - [`Manageable`]: creates and deletes children (`Container::as_manageable`)
//! - [`Readable`]: hands out bytes (`as_readable`)
//! - [`Writable`]: replaces bytes through a [`ResourceWriter`] (`as_writable`)
//!
//! Two trees ship with this crate: [`LocalResource`] mirrors a directory on
//! disk and [`MemoryResource`] lives in process memory.
//!
//! # Example
//!
//! ```rust
//! use remotefs_resource::{resolve, MemoryResource, ResourcePath, ResourceRef};
//!
//! let root = MemoryResource::directory("");
//! root.add_directory("docs").add_file("readme.txt", "text/plain", b"hi".to_vec());
//!
//! let root: ResourceRef = root;
//! let found = resolve(&root, &ResourcePath::parse("/docs/readme.txt").unwrap()).unwrap();
//! assert!(found.is_some());
//! ```

mod content_type;
mod error;
mod local;
mod memory;
mod path;
mod resolve;
mod traits;

pub use content_type::guess_content_type;
pub use error::{Capability, Error};
pub use local::LocalResource;
pub use memory::MemoryResource;
pub use path::{PathError, ResourcePath};
pub use resolve::{mkdirs, resolve, Resolved};
pub use traits::{
    read_all, write_all, Container, Manageable, Readable, Resource, ResourceRef, ResourceWriter,
    Writable, DEFAULT_CONTENT_TYPE, DIRECTORY,
};
