//! The "hashfile" format: an indentation-nested, order-preserving
//! `key: value` text format used for the hub's config overlay, permission
//! tables, and other hand-editable structured files (§3 File/HashFile).
//!
//! ```text
//! sys_tmp_dir: /var/www/x/tmp
//! mounts:
//!   /shared: /var/www/shared
//! permissions:
//!   ^/admin/: g:admins=ALL ; *=NONE
//! ```

use crate::error::AppError;
use crate::node::{Mapping, Node};

/// Parses hashfile text into an ordered [`Mapping`].
pub fn parse(text: &str) -> Result<Mapping, AppError> {
    let lines: Vec<Line> = text
        .lines()
        .filter_map(strip_comment_and_measure)
        .collect();
    let mut pos = 0;
    let (mapping, consumed) = parse_block(&lines, 0, 0)?;
    pos += consumed;
    if pos < lines.len() {
        return Err(AppError::Logical(
            "hashfile: trailing content at unexpected indentation".into(),
        ));
    }
    Ok(mapping)
}

struct Line<'a> {
    indent: usize,
    key: &'a str,
    inline_value: Option<&'a str>,
}

fn strip_comment_and_measure(raw: &str) -> Option<Line<'_>> {
    let trimmed_start = raw.trim_start_matches(' ');
    let indent = raw.len() - trimmed_start.len();
    let content = trimmed_start.trim_end();
    if content.is_empty() || content.starts_with('#') {
        return None;
    }
    let (key, rest) = content.split_once(':')?;
    let value = rest.trim();
    Some(Line {
        indent,
        key: key.trim(),
        inline_value: if value.is_empty() { None } else { Some(value) },
    })
}

/// Parses a run of lines at exactly `indent`, starting at `start`. Returns
/// the mapping and how many lines were consumed.
fn parse_block(lines: &[Line], start: usize, indent: usize) -> Result<(Mapping, usize), AppError> {
    let mut mapping = Mapping::new();
    let mut i = start;

    while i < lines.len() {
        let line = &lines[i];
        if line.indent < indent {
            break;
        }
        if line.indent > indent {
            return Err(AppError::Logical(format!(
                "hashfile: unexpected indentation at key {:?}",
                line.key
            )));
        }

        if let Some(value) = line.inline_value {
            mapping.insert(line.key.to_owned(), Node::text(value.to_owned()));
            i += 1;
        } else {
            // Look ahead for a deeper block belonging to this key.
            let child_indent = lines.get(i + 1).map(|l| l.indent);
            match child_indent {
                Some(child) if child > indent => {
                    let (child_mapping, consumed) = parse_block(lines, i + 1, child)?;
                    mapping.insert(line.key.to_owned(), Node::Mapping(child_mapping));
                    i += 1 + consumed;
                }
                _ => {
                    mapping.insert(line.key.to_owned(), Node::text(""));
                    i += 1;
                }
            }
        }
    }

    Ok((mapping, i - start))
}

/// Serializes a [`Mapping`] back to hashfile text, preserving insertion
/// order at every level (§3 round-trip invariant).
pub fn serialize(mapping: &Mapping) -> Vec<u8> {
    let mut out = String::new();
    write_block(&mut out, mapping, 0);
    out.into_bytes()
}

fn write_block(out: &mut String, mapping: &Mapping, indent: usize) {
    let pad = " ".repeat(indent);
    for (key, value) in mapping.0.iter() {
        match value {
            Node::Mapping(child) => {
                out.push_str(&pad);
                out.push_str(key);
                out.push_str(":\n");
                write_block(out, child, indent + 2);
            }
            Node::Scalar(crate::node::Scalar::Text(text)) => {
                out.push_str(&pad);
                out.push_str(key);
                out.push_str(": ");
                out.push_str(text);
                out.push('\n');
            }
            other => {
                out.push_str(&pad);
                out.push_str(key);
                out.push_str(": ");
                out.push_str(&crate::node::node_to_json(other).to_string());
                out.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_flat() {
        let text = "sys_tmp_dir: /var/www/x/tmp\nhost: example.com\n";
        let m = parse(text).unwrap();
        assert_eq!(m.keys().collect::<Vec<_>>(), vec!["sys_tmp_dir", "host"]);
        let back = String::from_utf8(serialize(&m)).unwrap();
        assert_eq!(back, text);
    }

    #[test]
    fn roundtrip_nested_preserves_order() {
        let text = "mounts:\n  /shared: /var/www/shared\n  /res: /var/www/res\npermissions:\n  ^/admin/: g:admins=ALL ; *=NONE\n";
        let m = parse(text).unwrap();
        let back = String::from_utf8(serialize(&m)).unwrap();
        assert_eq!(back, text);
    }

    #[test]
    fn load_then_save_with_no_mutation_is_byte_identical() {
        let text = "a: 1\nb:\n  c: 2\n  d: 3\ne: 4\n";
        let m = parse(text).unwrap();
        assert_eq!(String::from_utf8(serialize(&m)).unwrap(), text);
    }
}
