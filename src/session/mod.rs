//! Session & authorization (§4.F): SID cookies, signed auth tokens, the
//! legacy sha1 login challenge, and per-vhost permission rules.

pub mod credentials;
pub mod login;
pub mod permissions;
pub mod sid;
pub mod signatures;
pub mod token;

use chrono::Duration;

use crate::config_loader::ConfigLoader;
use crate::error::AppError;
use crate::node::{Node, Scalar};
use crate::session::signatures::MessageVerifier;
use crate::session::token::{SignedToken, Token};

/// The identity attached to a request once its session cookie has been
/// validated, or `None` for an anonymous visitor.
#[derive(Clone, Debug)]
pub struct Identity {
    pub username: String,
    pub groups: Vec<String>,
}

/// Validates the `Authorization`-style session cookie value and returns the
/// identity it carries, if any. A missing or invalid cookie is anonymous,
/// not an error — §4.F treats authentication as optional unless a
/// permission rule demands it.
pub fn identify(cookie_value: Option<&str>, groups_of: impl Fn(&str) -> Vec<String>) -> Option<Identity> {
    let encoded = cookie_value?;
    let verifier: MessageVerifier<Token> = MessageVerifier::default();
    let signed = SignedToken::decode(encoded).ok()?;
    let token = verifier.verify_token(&signed).ok()?;

    let groups = groups_of(token.username());
    Some(Identity {
        username: token.username().to_owned(),
        groups,
    })
}

/// Reads the vhost config's `groups` mapping (group name → comma-separated
/// usernames) and returns every group `user` belongs to. Absent entirely if
/// no vhost config declares any groups.
pub fn groups_for_user(config: &ConfigLoader, user: &str) -> Vec<String> {
    let Some(Node::Mapping(groups)) = config.get("groups") else {
        return Vec::new();
    };
    groups
        .0
        .iter()
        .filter_map(|(name, value)| match value {
            Node::Scalar(Scalar::Text(members)) => {
                members.split(',').map(str::trim).any(|m| m == user).then(|| name.clone())
            }
            _ => None,
        })
        .collect()
}

/// Mints a fresh signed session token for `username`, valid for 12 hours.
pub fn issue(username: &str) -> Result<String, AppError> {
    let verifier: MessageVerifier<Token> = MessageVerifier::default();
    let token = Token::new(username, Duration::hours(12));
    verifier
        .sign_token(&token)
        .and_then(|signed| signed.encode())
        .map_err(|e| AppError::Logical(e.to_string()))
}
