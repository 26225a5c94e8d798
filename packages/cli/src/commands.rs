//! Subcommand implementations.
//!
//! Every command resolves its path against the client tree, so listings are
//! fetched lazily along the way and only for the directories it walks.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use nu_ansi_term::{Color, Style};

use remotefs_http::{RemoteContainer, RemoteItem, RemoteResource};
use remotefs_resource::{guess_content_type, Resource, ResourcePath, DIRECTORY};

fn parse(path: &str) -> Result<ResourcePath> {
    ResourcePath::parse(path).with_context(|| format!("invalid path '{path}'"))
}

fn lookup(root: &RemoteContainer, path: &ResourcePath) -> Result<RemoteResource> {
    root.resolve(path)?
        .ok_or_else(|| anyhow!("'{path}' does not exist"))
}

fn directory(root: &RemoteContainer, path: &ResourcePath) -> Result<Arc<RemoteContainer>> {
    match lookup(root, path)? {
        RemoteResource::Container(container) => Ok(container),
        RemoteResource::Item(_) => bail!("'{path}' is not a directory"),
    }
}

fn file(root: &RemoteContainer, path: &ResourcePath) -> Result<Arc<RemoteItem>> {
    match lookup(root, path)? {
        RemoteResource::Item(item) => Ok(item),
        RemoteResource::Container(_) => bail!("'{path}' is a directory"),
    }
}

/// Parent directory and final name of a non-root path.
fn split(root: &RemoteContainer, path: &ResourcePath) -> Result<(Arc<RemoteContainer>, String)> {
    match (path.parent(), path.name()) {
        (Some(parent), Some(name)) => Ok((directory(root, &parent)?, name.to_string())),
        _ => bail!("the root cannot be replaced"),
    }
}

pub fn ls(root: &RemoteContainer, path: &str, long: bool, out: &mut dyn Write) -> Result<()> {
    let path = parse(path)?;
    let dir = directory(root, &path)?;
    let dir_style = Style::new().bold().fg(Color::Blue);

    for (name, child) in dir.children()?.iter() {
        let is_dir = child.as_container().is_some();
        let label = if is_dir {
            dir_style.paint(format!("{name}/")).to_string()
        } else {
            name.clone()
        };

        if !long {
            writeln!(out, "{label}")?;
            continue;
        }

        let size = match child.as_item() {
            Some(item) => item.size().map(|s| s.to_string()).unwrap_or_default(),
            None => "-".to_string(),
        };
        let modified = child
            .last_modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{:>10}  {:<16}  {}  {}",
            size,
            modified,
            Color::DarkGray.paint(format!("{:<24}", child.content_type())),
            label
        )?;
    }
    Ok(())
}

pub fn cat(root: &RemoteContainer, path: &str, out: &mut dyn Write) -> Result<()> {
    let path = parse(path)?;
    let content = file(root, &path)?.read()?;
    out.write_all(&content)?;
    Ok(())
}

/// Replace the content at `path`, reading from `source` or stdin.
pub fn put(
    root: &RemoteContainer,
    path: &str,
    source: Option<&Path>,
    content_type: Option<&str>,
) -> Result<()> {
    let content = match source {
        Some(source) => {
            std::fs::read(source).with_context(|| format!("reading {}", source.display()))?
        }
        None => {
            let mut buffer = Vec::new();
            io::stdin().read_to_end(&mut buffer)?;
            buffer
        }
    };
    write_content(root, path, &content, content_type)
}

pub(crate) fn write_content(
    root: &RemoteContainer,
    path: &str,
    content: &[u8],
    content_type: Option<&str>,
) -> Result<()> {
    let path = parse(path)?;
    let item = match root.resolve(&path)? {
        Some(RemoteResource::Item(item)) => item,
        Some(RemoteResource::Container(_)) => bail!("'{path}' is a directory"),
        None => create_file(root, &path, content_type)?,
    };

    let mut writer = item.writer()?;
    writer.write_all(content)?;
    writer.finish()?;
    tracing::info!(path = %path, bytes = content.len(), "stored");
    Ok(())
}

fn create_file(
    root: &RemoteContainer,
    path: &ResourcePath,
    content_type: Option<&str>,
) -> Result<Arc<RemoteItem>> {
    let (parent, name) = split(root, path)?;
    let content_type = content_type.unwrap_or_else(|| guess_content_type(&name));
    match parent.create(&name, content_type)? {
        RemoteResource::Item(item) => Ok(item),
        RemoteResource::Container(_) => bail!("'{path}' was created as a directory"),
    }
}

pub fn mkdir(root: &RemoteContainer, path: &str, parents: bool) -> Result<()> {
    let path = parse(path)?;
    if !parents {
        let (parent, name) = split(root, &path)?;
        parent.create(&name, DIRECTORY)?;
        return Ok(());
    }

    let mut current = directory(root, &ResourcePath::root())?;
    for name in path.iter() {
        current = match current.child(name)? {
            Some(RemoteResource::Container(next)) => next,
            Some(RemoteResource::Item(_)) => bail!("'{name}' in '{path}' is a file"),
            None => match current.create(name, DIRECTORY)? {
                RemoteResource::Container(next) => next,
                RemoteResource::Item(_) => bail!("'{name}' was created as a file"),
            },
        };
    }
    Ok(())
}

pub fn touch(root: &RemoteContainer, path: &str, content_type: Option<&str>) -> Result<()> {
    let path = parse(path)?;
    if root.resolve(&path)?.is_none() {
        create_file(root, &path, content_type)?;
    }
    Ok(())
}

pub fn rm(root: &RemoteContainer, path: &str) -> Result<()> {
    let path = parse(path)?;
    let (parent, name) = split(root, &path)?;
    if parent.child(&name)?.is_none() {
        bail!("'{path}' does not exist");
    }
    parent.delete(&name)?;
    Ok(())
}

pub fn exists(root: &RemoteContainer, path: &str, out: &mut dyn Write) -> Result<()> {
    let path = parse(path)?;
    let found = if path.is_root() {
        root.exists()?
    } else {
        root.resolve(&path)?.is_some()
    };
    writeln!(out, "{found}")?;
    Ok(())
}
