//! Wire format of directory listings.
//!
//! A listing is an XML document:
//!
//! ```xml
//! <list path="/some/dir" manageable="true">
//!   <entry>
//!     <name>file.txt</name>
//!     <hash>...</hash>
//!     <contentType>text/plain</contentType>
//!     <size>123</size>
//!     <lastModified>2024-05-01T10:00:00Z</lastModified>
//!     <writable>true</writable>
//!     <path>/some/dir/file.txt</path>
//!     <content>...base64...</content>
//!   </entry>
//! </list>
//! ```
//!
//! Element order follows the field order of [`Entry`]. Directory entries
//! produced in recursive mode carry a nested `<children>` list. The same
//! structure can be exchanged as JSON.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use remotefs_resource::DIRECTORY;
use serde::{Deserialize, Serialize};

use crate::Error;

pub const XML_CONTENT_TYPE: &str = "application/xml";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One directory's worth of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename = "list")]
pub struct Listing {
    #[serde(rename = "@path")]
    pub path: String,

    #[serde(rename = "@manageable", default)]
    pub manageable: bool,

    #[serde(rename = "entry", default)]
    pub entries: Vec<Entry>,
}

/// A single child in a [`Listing`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub name: String,

    /// MD5 hex digest of the content, when the server did not inline it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    pub content_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,

    #[serde(default = "writable_default")]
    pub writable: bool,

    pub path: String,

    /// Nested listing, only present in recursive mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Listing>,

    /// Inlined content, only present in full mode for small items.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "base64_content"
    )]
    pub content: Option<Bytes>,
}

fn writable_default() -> bool {
    true
}

impl Entry {
    pub fn is_container(&self) -> bool {
        self.content_type == DIRECTORY
    }
}

impl Listing {
    pub fn new(path: impl Into<String>, manageable: bool) -> Self {
        Self {
            path: path.into(),
            manageable,
            entries: Vec::new(),
        }
    }

    pub fn to_xml(&self) -> Result<String, Error> {
        quick_xml::se::to_string(self).map_err(Error::encoding)
    }

    pub fn from_xml(xml: &str) -> Result<Self, Error> {
        quick_xml::de::from_str(xml).map_err(Error::encoding)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a response body, picking the encoding from its content type.
    /// Anything that is not JSON is read as XML.
    pub fn decode(body: &[u8], content_type: Option<&str>) -> Result<Self, Error> {
        if content_type.is_some_and(|ct| ct.contains("json")) {
            return serde_json::from_slice(body).map_err(Error::encoding);
        }
        let xml = std::str::from_utf8(body).map_err(Error::encoding)?;
        Self::from_xml(xml)
    }
}

mod base64_content {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Bytes>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Bytes>, D::Error> {
        let Some(text) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let cleaned: String = text.split_whitespace().collect();
        STANDARD
            .decode(cleaned)
            .map(|decoded| Some(Bytes::from(decoded)))
            .map_err(serde::de::Error::custom)
    }
}
