//! Standard / Data / Empty responders (§4.G): format the resolved Node's
//! already-materialized content as the response body. The template-engine
//! and formatter hooks mentioned in the design note are out of scope (§1
//! non-goals) — here "format" means turning a Node into bytes of a
//! `Content-Type` the client can use.

use crate::error::AppError;
use crate::node::{Node, Scalar};
use crate::request::Request;
use crate::response::{Body, Response};

pub struct StandardResponder;

impl super::Responder for StandardResponder {
    fn matches(&self, _node: &Node, _request: &Request) -> bool {
        true
    }

    fn compile(&self, node: &Node, _request: &Request) -> Result<Response, AppError> {
        let mut response = match node {
            Node::Scalar(Scalar::Text(text)) => {
                let mut r = Response::text(text.clone());
                r.set_header("Content-Type", "text/plain; charset=utf-8");
                r
            }
            Node::Scalar(Scalar::Binary(bytes)) => {
                let mut r = Response {
                    body: Body::Binary(bytes.clone()),
                    binmode: true,
                    ..Response::default()
                };
                r.set_header("Content-Type", "application/octet-stream");
                r
            }
            Node::Mapping(_) | Node::Sequence(_) => {
                let json = crate::node::node_to_json(node);
                let mut r = Response::text(json.to_string());
                r.set_header("Content-Type", "application/json");
                r
            }
            Node::File(_) => {
                let data = node.get_data()?;
                return StandardResponder.compile(&data, _request);
            }
            Node::Code(_) => {
                let result = node.invoke(&crate::node::Mapping::new())?;
                return StandardResponder.compile(&result, _request);
            }
            Node::Directory(_) => {
                return Err(AppError::Logical(
                    "directories are served by the directory responder".into(),
                ))
            }
        };

        if let Ok(mtime) = node.get_mtime() {
            response.mtime = Some(mtime);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responders::Responder;

    #[test]
    fn text_scalar_gets_plain_content_type() {
        let node = Node::text("hello");
        let req = Request::new("GET".into(), "http".into(), "h".into(), "/x".into());
        let response = StandardResponder.compile(&node, &req).unwrap();
        assert_eq!(response.headers.get("Content-Type").unwrap(), "text/plain; charset=utf-8");
    }

    #[test]
    fn mapping_is_serialized_as_json() {
        let mut m = crate::node::Mapping::new();
        m.insert("a", Node::text("1"));
        let req = Request::new("GET".into(), "http".into(), "h".into(), "/x".into());
        let response = StandardResponder.compile(&Node::Mapping(m), &req).unwrap();
        match response.body {
            crate::response::Body::Text(t) => assert_eq!(t, r#"{"a":"1"}"#),
            _ => panic!(),
        }
    }
}
