//! Responder dispatch (§4.G): rule-matched selection of the component that
//! turns a resolved [`crate::node::Node`] into a [`crate::response::Response`].

pub mod directory;
pub mod health_check;
pub mod hub_api;
pub mod image;
pub mod redirect;
pub mod standard;

use crate::config_loader::ConfigLoader;
use crate::error::AppError;
use crate::node::{Node, Scalar};
use crate::request::Request;
use crate::response::Response;

/// A responder's declared contract (§4.G): its permission requirement and
/// post/upload capabilities, checked by the lifecycle before `compile()` is
/// ever invoked.
pub trait Responder: Send + Sync {
    /// True if this responder claims `node`/`request`. Checked in reverse
    /// registration order so a later, more specific responder can shadow an
    /// earlier general one (§4.G "rule-matched dispatch").
    fn matches(&self, node: &Node, request: &Request) -> bool;

    /// Permission letters this responder requires, over `rwxvq`.
    fn permission_mode(&self) -> &str {
        "r"
    }

    fn can_post(&self) -> bool {
        false
    }

    fn can_upload(&self) -> bool {
        false
    }

    /// Bytes; 0 means unlimited.
    fn max_post_size(&self) -> u64 {
        0
    }

    fn compile(&self, node: &Node, request: &Request) -> Result<Response, AppError>;
}

/// An ordered set of responders, tried most-recently-registered-first.
#[derive(Default)]
pub struct ResponderRegistry {
    responders: Vec<Box<dyn Responder>>,
}

impl ResponderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, responder: Box<dyn Responder>) {
        self.responders.push(responder);
    }

    /// The first responder (scanning from the most recently registered) that
    /// claims this node/request.
    pub fn dispatch(&self, node: &Node, request: &Request) -> Option<&dyn Responder> {
        self.responders
            .iter()
            .rev()
            .find(|r| r.matches(node, request))
            .map(|r| r.as_ref())
    }

    /// The base chain every vhost starts with: directory listing, the
    /// hub data API under `/api/hub`, redirect nodes, and finally the
    /// standard content responder as the catch-all. An unauthenticated
    /// health check is added only if the vhost config opts in.
    pub fn default_chain(config: &ConfigLoader) -> Self {
        let mut registry = ResponderRegistry::new();
        registry.register(Box::new(standard::StandardResponder));
        registry.register(Box::new(redirect::RedirectResponder));
        registry.register(Box::new(image::ImageResponder));
        registry.register(Box::new(directory::DirectoryResponder));
        registry.register(Box::new(hub_api::HubApiResponder));
        if let Some(Node::Scalar(Scalar::Text(path))) = config.get("health_check_path") {
            registry.register(Box::new(health_check::HealthCheckResponder { path: path.clone() }));
        }
        registry
    }
}
