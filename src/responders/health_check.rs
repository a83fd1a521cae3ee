//! Health check (§A.3 supplemented feature): an ordinary, unauthenticated
//! responder mounted at a config-listed path. Disabled by default — `/sys`
//! is forbidden to clients, so this is the only operator-visible liveness
//! signal, and only exists where `health_check_path` is set in the vhost's
//! config overlay.

use chrono::Utc;
use serde::Serialize;

use crate::error::AppError;
use crate::node::Node;
use crate::request::Request;
use crate::response::Response;

pub struct HealthCheckResponder {
    pub path: String,
}

#[derive(Serialize)]
struct HealthCheck {
    current_time: String,
}

impl super::Responder for HealthCheckResponder {
    fn matches(&self, _node: &Node, request: &Request) -> bool {
        request.page.addr.to_canonical() == self.path
    }

    fn compile(&self, _node: &Node, _request: &Request) -> Result<Response, AppError> {
        let body = HealthCheck {
            current_time: Utc::now().to_rfc3339(),
        };
        let mut response = Response::text(serde_json::to_string(&body)?);
        response.set_header("Content-Type", "application/json");
        response.can_cache = false;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::DirectoryNode;
    use crate::responders::Responder;

    #[test]
    fn matches_only_its_configured_path() {
        let responder = HealthCheckResponder { path: "/healthz".into() };
        let node = Node::Directory(DirectoryNode { path: "/tmp".into() });
        let hit = Request::new("GET".into(), "http".into(), "h".into(), "/healthz".into());
        let miss = Request::new("GET".into(), "http".into(), "h".into(), "/other".into());
        assert!(responder.matches(&node, &hit));
        assert!(!responder.matches(&node, &miss));
    }
}
