//! Path resolution against a tree root.

use std::sync::Arc;

use crate::traits::{ResourceRef, DIRECTORY};
use crate::{Capability, Error, ResourcePath};

/// A resource found by [`resolve`], together with the container holding it.
#[derive(Clone)]
pub struct Resolved {
    /// `None` when the resolved resource is the root itself.
    pub parent: Option<ResourceRef>,
    pub resource: ResourceRef,
}

/// Walk `path` down from `root`.
///
/// Returns `Ok(None)` if any component is missing or if a non-container is
/// found before the end of the path.
pub fn resolve(root: &ResourceRef, path: &ResourcePath) -> Result<Option<Resolved>, Error> {
    let mut parent = None;
    let mut current = Arc::clone(root);

    for name in path.iter() {
        let next = match current.as_container() {
            Some(container) => container.child(name)?,
            None => return Ok(None),
        };
        match next {
            Some(child) => {
                parent = Some(current);
                current = child;
            }
            None => return Ok(None),
        }
    }

    Ok(Some(Resolved {
        parent,
        resource: current,
    }))
}

/// Resolve `path` as a container, creating every missing directory on the way.
pub fn mkdirs(root: &ResourceRef, path: &ResourcePath) -> Result<ResourceRef, Error> {
    let mut current = Arc::clone(root);
    let mut walked = ResourcePath::root();

    for name in path.iter() {
        walked = walked.child(name)?;
        let container = current
            .as_container()
            .ok_or_else(|| Error::not_capable(&walked, Capability::Listable))?;

        let next = match container.child(name)? {
            Some(existing) => existing,
            None => {
                tracing::debug!(path = %walked, "creating intermediate directory");
                container
                    .as_manageable()
                    .ok_or_else(|| Error::not_capable(&walked, Capability::Manageable))?
                    .create(name, DIRECTORY)?
            }
        };
        current = next;
    }

    if !current.is_container() {
        return Err(Error::not_capable(path, Capability::Listable));
    }
    Ok(current)
}
