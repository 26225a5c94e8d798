//! # remotefs-http
//!
//! Remote resource trees over HTTP.
//!
//! ## Client
//!
//! [`RemoteContainer`] mirrors a directory tree served by a remote host.
//! Listings are fetched lazily, once per container, and may cover whole
//! subtrees (`recursive`) or carry small file contents inline (`full`):
//!
//! ```ignore
//! use remotefs_http::{RemoteConfig, RemoteContainer};
//!
//! let config = RemoteConfig::from_uri("remote://files.example.com:8080/api")?;
//! let root = RemoteContainer::connect(&config)?;
//!
//! for (name, child) in root.children()?.iter() {
//!     println!("{name}\t{}", child.content_type());
//! }
//! ```
//!
//! Items keep their content in memory once read and, when a cache
//! directory is configured, on disk keyed by content hash. Writes are sent
//! when the writer is closed, either inline or through a [`WriteBack`]
//! executor attached to the tree's [`Connection`].
//!
//! ## Server
//!
//! [`ResourceServer`] answers the protocol for any
//! [`remotefs_resource::Resource`] tree. It is transport-agnostic: hand it
//! an [`HttpRequest`], get an [`HttpResponse`] back.
//!
//! ```ignore
//! use std::sync::Arc;
//! use remotefs_http::{RemoteConfig, RemoteContainer, ResourceServer};
//! use remotefs_resource::LocalResource;
//!
//! let server = ResourceServer::new(LocalResource::open("/srv/files")?);
//! let root = RemoteContainer::open(Arc::new(server), &RemoteConfig::new("http://localhost/")?);
//! ```

pub mod cache;
mod client;
pub mod config;
mod error;
pub mod executor;
pub mod listing;
pub mod server;
pub mod types;
pub mod writeback;

pub use cache::DiskCache;
pub use client::{ChildMap, Connection, ItemWriter, RemoteContainer, RemoteItem, RemoteResource};
pub use config::{Credentials, Defaults, RemoteConfig};
pub use error::Error;
pub use executor::{HttpExecutor, ReqwestExecutor};
pub use listing::{Entry, Listing};
pub use server::{ResourceServer, ServerConfig};
pub use types::{HttpRequest, HttpResponse, Method};
pub use writeback::{WriteBack, WriteBackQueue};
