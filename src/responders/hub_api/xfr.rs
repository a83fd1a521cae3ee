//! `upload` and `download` (§4.I): the hub data API's two byte-transfer
//! verbs. Both spool through `tmp/xfr/<id>` before moving the finished
//! payload into place, so a crash mid-transfer never leaves a partial file
//! visible at the destination address.

use std::io::Read;

use serde_json::{json, Value as JsonValue};

use crate::address::Address;
use crate::error::AppError;
use crate::hub::Hub;
use crate::node::Node;

use super::record_progress;

fn spool_dir(hub: &Hub) -> std::path::PathBuf {
    hub.root.join("tmp").join("xfr")
}

fn destination_path(hub: &Hub, target: &Address, name: &str) -> Result<std::path::PathBuf, AppError> {
    match hub.resolve(target)? {
        Some(Node::Directory(dir)) => Ok(dir.path.join(name)),
        Some(_) => Err(AppError::Logical("upload/download target must be a directory".into())),
        None => Err(AppError::DoesNotExist(target.to_canonical())),
    }
}

/// `upload` — spools `bytes` to `tmp/xfr/<id>`, then moves it into
/// `target/name`. Refuses to clobber an existing node unless `replace`.
pub fn upload(
    hub: &Hub,
    target: &Address,
    name: &str,
    bytes: &[u8],
    replace: bool,
    max_size: u64,
    progress_id: &str,
) -> Result<JsonValue, AppError> {
    if max_size > 0 && bytes.len() as u64 > max_size {
        return Err(AppError::IllegalArg(format!(
            "upload of {} bytes exceeds max_post_size ({max_size})",
            bytes.len()
        )));
    }

    let dest_path = destination_path(hub, target, name)?;
    if dest_path.exists() && !replace {
        return Err(AppError::Logical(format!("{name} already exists")));
    }

    let spool_dir = spool_dir(hub);
    std::fs::create_dir_all(&spool_dir)?;
    let spool_path = spool_dir.join(progress_id);

    record_progress(progress_id, bytes.len() as u64, 0, false);
    std::fs::write(&spool_path, bytes)?;
    record_progress(progress_id, bytes.len() as u64, bytes.len() as u64, false);

    std::fs::rename(&spool_path, &dest_path)?;
    record_progress(progress_id, bytes.len() as u64, bytes.len() as u64, true);

    Ok(json!({ "addr": target.join(name).to_canonical() }))
}

/// `download` — a server-side GET of `uri`, streamed in chunks into
/// `target/name` through the same `tmp/xfr/<id>` spool as `upload`, aborting
/// if the response exceeds `max_post_size`.
pub fn download(
    hub: &Hub,
    target: &Address,
    name: &str,
    uri: &str,
    max_size: u64,
    progress_id: &str,
) -> Result<JsonValue, AppError> {
    let dest_path = destination_path(hub, target, name)?;

    let response = reqwest::blocking::get(uri)
        .map_err(|e| AppError::Logical(format!("download transport failure: {e}")))?;
    let declared_size = response.content_length().unwrap_or(0);
    record_progress(progress_id, declared_size, 0, false);

    let spool_dir = spool_dir(hub);
    std::fs::create_dir_all(&spool_dir)?;
    let spool_path = spool_dir.join(progress_id);
    let mut spool_file = std::fs::File::create(&spool_path)?;

    let mut reader = response;
    let mut buf = [0u8; 64 * 1024];
    let mut received: u64 = 0;
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| AppError::Logical(format!("download transport failure: {e}")))?;
        if n == 0 {
            break;
        }
        received += n as u64;
        if max_size > 0 && received > max_size {
            let _ = std::fs::remove_file(&spool_path);
            return Err(AppError::IllegalArg(format!(
                "download exceeds max_post_size ({max_size})"
            )));
        }
        std::io::Write::write_all(&mut spool_file, &buf[..n])?;
        record_progress(progress_id, declared_size.max(received), received, false);
    }
    drop(spool_file);

    std::fs::rename(&spool_path, &dest_path)?;
    record_progress(progress_id, received, received, true);

    Ok(json!({ "addr": target.join(name).to_canonical(), "size": received }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::MountTable;

    #[test]
    fn upload_moves_spooled_bytes_into_place() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let result = upload(&hub, &Address::parse("/uploads"), "a.txt", b"hello", false, 0, "id1").unwrap();
        assert_eq!(result["addr"], "/uploads/a.txt");
        assert_eq!(std::fs::read_to_string(dir.path().join("uploads/a.txt")).unwrap(), "hello");
    }

    #[test]
    fn upload_refuses_to_clobber_without_replace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        std::fs::write(dir.path().join("uploads/a.txt"), "old").unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let err = upload(&hub, &Address::parse("/uploads"), "a.txt", b"new", false, 0, "id2").unwrap_err();
        assert!(matches!(err, AppError::Logical(_)));
    }

    #[test]
    fn upload_rejects_a_body_over_max_post_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("uploads")).unwrap();
        let hub = Hub::new(dir.path().to_path_buf(), MountTable::new());

        let err = upload(&hub, &Address::parse("/uploads"), "a.txt", b"too big", false, 4, "id3").unwrap_err();
        assert!(matches!(err, AppError::IllegalArg(_)));
    }
}
