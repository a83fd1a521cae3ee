//! Image responder (§4.G): serves binary image files directly, via
//! zero-copy `send_file` where possible. Watermarking
//! (`handlers/image/watermark`) is a configured passthrough hook the
//! original exposes; no image-processing runtime is implemented here
//! (§1 non-goals — no template/codec engine beyond serving bytes).

use crate::error::AppError;
use crate::node::{FileKind, Node};
use crate::request::Request;
use crate::response::Response;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg"];

pub struct ImageResponder;

impl super::Responder for ImageResponder {
    fn matches(&self, node: &Node, _request: &Request) -> bool {
        match node {
            Node::File(f) if f.kind == FileKind::BinaryFile => f
                .path
                .extension()
                .and_then(|e| e.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn compile(&self, node: &Node, _request: &Request) -> Result<Response, AppError> {
        let Node::File(file) = node else {
            return Err(AppError::Logical("image responder requires a File node".into()));
        };

        let mut response = Response {
            send_file: Some(file.path.clone()),
            binmode: true,
            ..Response::default()
        };
        response.set_header("Content-Type", content_type_for(&file.path));
        response.mtime = node.get_mtime().ok();
        Ok(response)
    }
}

fn content_type_for(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
