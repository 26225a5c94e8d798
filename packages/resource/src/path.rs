//! Normalized absolute paths inside a resource tree.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A name that cannot appear in a [`ResourcePath`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid name '{name}' at depth {depth}: {reason}")]
pub struct PathError {
    pub name: String,
    pub depth: usize,
    pub reason: &'static str,
}

/// An absolute path to a resource, relative to the root of its tree.
///
/// Paths always display with a leading `/` and the root displays as `/`.
/// Names are opaque and case-sensitive. Only `.`, `..`, the empty name and
/// names containing `/` or NUL are rejected, so a path can never escape
/// the root it is resolved against.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourcePath {
    names: Vec<String>,
}

fn check(name: &str, depth: usize) -> Result<(), PathError> {
    let reason = match name {
        "" => "empty name",
        "." | ".." => "relative names are not allowed",
        _ if name.contains('/') => "contains a separator",
        _ if name.contains('\0') => "contains NUL",
        _ => return Ok(()),
    };
    Err(PathError {
        name: name.to_string(),
        depth,
        reason,
    })
}

impl ResourcePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path. Repeated, leading and trailing
    /// separators are ignored.
    ///
    /// ```rust
    /// use remotefs_resource::ResourcePath;
    ///
    /// let path = ResourcePath::parse("docs//readme.txt/").unwrap();
    /// assert_eq!(path.to_string(), "/docs/readme.txt");
    /// assert_eq!(ResourcePath::parse("").unwrap().to_string(), "/");
    /// ```
    pub fn parse(s: &str) -> Result<Self, PathError> {
        Self::try_from_components(
            s.split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Build a path from already split names, rejecting empty ones too.
    pub fn try_from_components(names: Vec<String>) -> Result<Self, PathError> {
        names
            .iter()
            .enumerate()
            .try_for_each(|(depth, name)| check(name, depth))?;
        Ok(Self { names })
    }

    /// Check that `name` can be used as a single path component.
    pub fn validate_name(name: &str) -> Result<(), PathError> {
        check(name, 0)
    }

    pub fn is_root(&self) -> bool {
        self.names.is_empty()
    }

    /// Depth below the root.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.names.iter()
    }

    /// The last component, or `None` for the root.
    pub fn name(&self) -> Option<&str> {
        self.names.last().map(String::as_str)
    }

    /// The parent path, or `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<ResourcePath> {
        let (_, init) = self.names.split_last()?;
        Some(Self {
            names: init.to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> Result<ResourcePath, PathError> {
        check(name, self.names.len())?;
        let mut names = Vec::with_capacity(self.names.len() + 1);
        names.extend_from_slice(&self.names);
        names.push(name.to_string());
        Ok(Self { names })
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.names.is_empty() {
            return f.write_str("/");
        }
        for name in &self.names {
            write!(f, "/{name}")?;
        }
        Ok(())
    }
}

impl FromStr for ResourcePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> ResourcePath {
        s.parse().unwrap()
    }

    #[test]
    fn depth_of_parsed_paths() {
        assert_eq!(p("").len(), 0);
        assert_eq!(p("/").len(), 0);
        assert_eq!(p("docs").len(), 1);
        assert_eq!(p("/docs/2024/q1.csv").len(), 3);
    }

    #[test]
    fn separators_collapse() {
        assert_eq!(p("docs/2024/"), p("docs/2024"));
        assert_eq!(p("docs//2024"), p("/docs/2024"));
    }

    #[test]
    fn display_always_has_leading_slash() {
        assert_eq!(p("").to_string(), "/");
        assert_eq!(p("a").to_string(), "/a");
        assert_eq!(p("a/b c/d.txt").to_string(), "/a/b c/d.txt");
    }

    #[test]
    fn names_are_opaque() {
        let path = p("My Docs/.hidden/Read-Me (1).TXT");
        let names: Vec<_> = path.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["My Docs", ".hidden", "Read-Me (1).TXT"]);
        assert_ne!(p("A"), p("a"));
    }

    #[test]
    fn relative_names_rejected() {
        assert!(ResourcePath::parse("docs/../etc").is_err());
        assert!(ResourcePath::parse("./docs").is_err());
        assert!(ResourcePath::parse("docs/x\0").is_err());
        assert!(ResourcePath::try_from_components(vec!["a".into(), String::new()]).is_err());
    }

    #[test]
    fn parent_and_name() {
        let path = p("a/b/c");
        assert_eq!(path.name(), Some("c"));
        assert_eq!(path.parent(), Some(p("a/b")));
        assert_eq!(ResourcePath::root().name(), None);
        assert_eq!(ResourcePath::root().parent(), None);
        assert_eq!(p("a").parent(), Some(ResourcePath::root()));
    }

    #[test]
    fn child_validates_name() {
        assert_eq!(p("a").child("b.txt").unwrap(), p("a/b.txt"));
        assert!(p("a").child("x/y").is_err());
        assert!(p("a").child("..").is_err());
        assert!(p("a").child("").is_err());
    }

    #[test]
    fn error_names_the_offender() {
        let err = ResourcePath::parse("a/..").unwrap_err();
        assert_eq!(err.depth, 1);
        assert_eq!(
            err.to_string(),
            "invalid name '..' at depth 1: relative names are not allowed"
        );
    }
}
