//! Directory listing responder (§4.G): serves a Directory node as a JSON
//! listing of its immediate children, sorted per [`crate::hub::fs_node`].

use crate::error::AppError;
use crate::node::Node;
use crate::request::Request;
use crate::response::Response;

pub struct DirectoryResponder;

impl super::Responder for DirectoryResponder {
    fn matches(&self, node: &Node, _request: &Request) -> bool {
        matches!(node, Node::Directory(_))
    }

    fn compile(&self, node: &Node, _request: &Request) -> Result<Response, AppError> {
        let Node::Directory(dir) = node else {
            return Err(AppError::Logical("directory responder requires a Directory node".into()));
        };

        let mut listing = crate::node::Mapping::new();
        for name in crate::hub::fs_node::read_dir_entries(&dir.path)? {
            let child = crate::hub::fs_node::node_for_path(&dir.path.join(&name))?;
            listing.insert(name, Node::text(child.type_tag(false)));
        }

        let mut response = Response::text(crate::node::node_to_json(&Node::Mapping(listing)).to_string());
        response.set_header("Content-Type", "application/json");
        response.mtime = node.get_mtime().ok();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responders::Responder;

    #[test]
    fn lists_children_with_type_tags() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let node = Node::Directory(crate::node::DirectoryNode { path: dir.path().to_path_buf() });
        let req = Request::new("GET".into(), "http".into(), "h".into(), "/".into());
        let response = DirectoryResponder.compile(&node, &req).unwrap();
        match response.body {
            crate::response::Body::Text(t) => {
                assert!(t.contains("\"a.txt\":\"file-text\""));
                assert!(t.contains("\"sub\":\"directory\""));
            }
            _ => panic!(),
        }
    }
}
