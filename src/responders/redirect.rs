//! Redirect responder (§4.G): a Mapping with a `redirect_to` key becomes a
//! 302 to that address instead of being served as data.

use crate::error::AppError;
use crate::node::Node;
use crate::request::Request;
use crate::response::Response;

pub struct RedirectResponder;

impl super::Responder for RedirectResponder {
    fn matches(&self, node: &Node, _request: &Request) -> bool {
        node.as_mapping()
            .map(|m| m.get("redirect_to").is_some())
            .unwrap_or(false)
    }

    fn compile(&self, node: &Node, _request: &Request) -> Result<Response, AppError> {
        let target = node
            .as_mapping()
            .and_then(|m| m.get("redirect_to"))
            .and_then(|n| n.as_scalar())
            .and_then(|s| match s {
                crate::node::Scalar::Text(t) => Some(t.clone()),
                _ => None,
            })
            .ok_or_else(|| AppError::Logical("redirect_to must be text".into()))?;

        let mut response = Response::default();
        response.status = 302;
        response.set_header("Location", target);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responders::Responder;

    #[test]
    fn redirects_to_configured_target() {
        let mut m = crate::node::Mapping::new();
        m.insert("redirect_to", Node::text("/new-home"));
        let req = Request::new("GET".into(), "http".into(), "h".into(), "/old".into());
        let response = RedirectResponder.compile(&Node::Mapping(m), &req).unwrap();
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("Location").unwrap(), "/new-home");
    }
}
