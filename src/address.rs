//! Address algebra (§4.A): pure functions over slash-delimited hub addresses.
//!
//! An address is canonical when it has a single leading slash, no trailing
//! slash (except the root `/`), and no empty interior segments. Addresses are
//! not filesystem paths: `..` segments are literal keys, never "go up".

use percent_encoding::percent_decode_str;

/// The sentinel segment meaning "append as a new trailing element of an
/// ordered sequence".
pub const NEXT: &str = "<next>";

/// An ordered list of address segments.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Address {
    segments: Vec<String>,
}

impl Address {
    pub fn root() -> Self {
        Address { segments: vec![] }
    }

    /// Parses and normalizes a textual address.
    pub fn parse(raw: &str) -> Self {
        Address {
            segments: split(raw),
        }
    }

    pub fn from_segments(segments: Vec<String>) -> Self {
        Address { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True if any segment is an abstract query segment (`{...}`).
    pub fn is_abstract(&self) -> bool {
        self.segments.iter().any(|s| is_abstract_segment(s))
    }

    /// The parent address. The root's parent is itself.
    pub fn parent(&self) -> Address {
        if self.segments.is_empty() {
            return self.clone();
        }
        Address {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// The final segment's name. Empty string at the root.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Appends a single already-normalized segment.
    pub fn join(&self, segment: &str) -> Address {
        let mut segments = self.segments.clone();
        segments.extend(split_interior(segment));
        Address { segments }
    }

    /// Appends every segment of `other`.
    pub fn extend(&self, other: &Address) -> Address {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Address { segments }
    }

    /// Canonical string form: `/a/b/c`, or `/` at the root.
    pub fn to_canonical(&self) -> String {
        if self.segments.is_empty() {
            "/".to_owned()
        } else {
            let mut s = String::new();
            for seg in &self.segments {
                s.push('/');
                s.push_str(seg);
            }
            s
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical())
    }
}

/// Splits a raw textual address into normalized segments: percent-decodes
/// each segment, drops empty interior segments (collapsing `//`), and drops
/// a lone trailing slash. `..` is never special-cased — it is a literal key.
fn split(raw: &str) -> Vec<String> {
    let trimmed = raw.strip_prefix('/').unwrap_or(raw);
    split_interior(trimmed)
}

fn split_interior(raw: &str) -> Vec<String> {
    raw.split('/')
        .filter(|s| !s.is_empty())
        .map(decode_segment)
        .collect()
}

fn decode_segment(seg: &str) -> String {
    // Abstract segments encode their own `{...}` syntax and are never
    // percent-decoded — their interior is a predicate, not a key.
    if is_abstract_segment(seg) {
        seg.to_owned()
    } else {
        percent_decode_str(seg).decode_utf8_lossy().into_owned()
    }
}

pub fn is_abstract_segment(seg: &str) -> bool {
    (seg.starts_with('{') && seg.ends_with('}'))
        || (seg.starts_with("|{") && seg.ends_with('}'))
}

/// Normalizes a raw textual address to its canonical string form.
/// Idempotent: `normalize(normalize(a)) == normalize(a)`.
pub fn normalize(raw: &str) -> String {
    Address::parse(raw).to_canonical()
}

pub fn addr_parent(raw: &str) -> String {
    Address::parse(raw).parent().to_canonical()
}

pub fn addr_name(raw: &str) -> String {
    Address::parse(raw).name().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["/a/b/c", "/a//b/", "a/b", "/", "", "/a/b/c/"] {
            let once = normalize(raw);
            let twice = normalize(&once);
            assert_eq!(once, twice, "raw={raw:?}");
        }
    }

    #[test]
    fn trailing_slash_normalizes_away() {
        assert_eq!(normalize("/a/b/"), "/a/b");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn dot_dot_is_literal() {
        assert_eq!(normalize("/a/../b"), "/a/../b");
    }

    #[test]
    fn percent_decoding_happens_before_normalization() {
        assert_eq!(normalize("/a%2Fb/c"), "/a/b/c");
        assert_eq!(normalize("/hello%20world"), "/hello world");
    }

    #[test]
    fn root_name_is_empty() {
        assert_eq!(addr_name("/"), "");
        assert_eq!(addr_name(""), "");
    }

    #[test]
    fn parent_and_name_roundtrip() {
        let a = Address::parse("/a/b/c");
        assert_eq!(a.parent().to_canonical(), "/a/b");
        assert_eq!(a.name(), "c");
    }

    #[test]
    fn abstract_segments_are_recognized_not_evaluated() {
        let a = Address::parse("/items/{?status=active}");
        assert!(a.is_abstract());
        assert_eq!(a.segments().last().unwrap(), "{?status=active}");
    }

    #[test]
    fn empty_interior_segments_collapse() {
        assert_eq!(normalize("/a//b///c"), "/a/b/c");
    }
}
