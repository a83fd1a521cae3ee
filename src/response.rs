//! The response object (§4.E): accumulated under the conceptual
//! `/sys/response` tree as the lifecycle's `compile()` phase runs.

use std::path::PathBuf;
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::hub::LogEntry;

#[derive(Clone, Debug)]
pub enum Body {
    Empty,
    Text(String),
    Binary(Vec<u8>),
}

impl Body {
    pub fn len(&self) -> usize {
        match self {
            Body::Empty => 0,
            Body::Text(t) => t.len(),
            Body::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Body::Empty => &[],
            Body::Text(t) => t.as_bytes(),
            Body::Binary(b) => b,
        }
    }
}

/// A response as it is built up through `compile()` and `send()`.
#[derive(Clone, Debug)]
pub struct Response {
    pub headers: IndexMap<String, String>,
    pub body: Body,
    /// Set by a responder wanting zero-copy delivery straight from disk.
    pub send_file: Option<PathBuf>,
    /// Skip the body-reformatting step (§4.J "respond").
    pub standalone: bool,
    /// A new URI to restart the lifecycle against, in place of sending.
    pub internal_redirect: Option<String>,
    pub cookies: IndexMap<String, String>,
    pub etag: Option<String>,
    pub mtime: Option<SystemTime>,
    pub status: u16,
    pub can_cache: bool,
    pub binmode: bool,
    pub fs_access_log: Vec<LogEntry>,
    pub fs_change_log: Vec<LogEntry>,
}

impl Default for Response {
    fn default() -> Self {
        Response {
            headers: IndexMap::new(),
            body: Body::Empty,
            send_file: None,
            standalone: false,
            internal_redirect: None,
            cookies: IndexMap::new(),
            etag: None,
            mtime: None,
            status: 200,
            can_cache: true,
            binmode: false,
            fs_access_log: Vec::new(),
            fs_change_log: Vec::new(),
        }
    }
}

impl Response {
    pub fn text(body: impl Into<String>) -> Self {
        Response {
            body: Body::Text(body.into()),
            ..Default::default()
        }
    }

    pub fn not_modified() -> Self {
        Response {
            status: 304,
            body: Body::Empty,
            ..Default::default()
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name.into(), value.into());
    }
}
