//! Content type guessing from file names.

use crate::traits::DEFAULT_CONTENT_TYPE;

const KNOWN_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("xsd", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("properties", "text/plain"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("svg", "image/svg+xml"),
    ("ico", "image/x-icon"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("jar", "application/java-archive"),
];

/// Guess a MIME type from the extension of `name`.
///
/// Falls back to `application/octet-stream` for unknown or missing
/// extensions. Matching is case-insensitive.
pub fn guess_content_type(name: &str) -> &'static str {
    let Some((_, extension)) = name.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };
    KNOWN_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(extension))
        .map(|(_, content_type)| *content_type)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions() {
        assert_eq!(guess_content_type("readme.txt"), "text/plain");
        assert_eq!(guess_content_type("index.HTML"), "text/html");
        assert_eq!(guess_content_type("archive.tar.gz"), "application/gzip");
    }

    #[test]
    fn unknown_extensions_fall_back() {
        assert_eq!(guess_content_type("Makefile"), DEFAULT_CONTENT_TYPE);
        assert_eq!(guess_content_type("data.bin"), DEFAULT_CONTENT_TYPE);
    }
}
