//! Permission rules (§4.F): an ordered list of address-regex rules, each
//! granting a letter-subset of `rwxvq` to a scope of principals. Uppercase
//! letters, or the keywords `ALL`/`NONE`, terminate evaluation at that clause
//! rather than falling through to later patterns.

use regex::Regex;

use crate::config_loader::ConfigLoader;
use crate::node::Node;

const R: u8 = 1 << 0;
const W: u8 = 1 << 1;
const X: u8 = 1 << 2;
const V: u8 = 1 << 3;
const Q: u8 = 1 << 4;

/// A bitset over the five permission letters `r, w, x, v, q`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModeSet(u8);

impl ModeSet {
    pub const NONE: ModeSet = ModeSet(0);
    pub const ALL: ModeSet = ModeSet(R | W | X | V | Q);

    /// Parses any mix of the five letters (case-insensitive); unrecognized
    /// characters are ignored.
    pub fn parse(raw: &str) -> ModeSet {
        let mut bits = 0u8;
        for ch in raw.chars() {
            bits |= match ch.to_ascii_lowercase() {
                'r' => R,
                'w' => W,
                'x' => X,
                'v' => V,
                'q' => Q,
                _ => 0,
            };
        }
        ModeSet(bits)
    }

    /// True if every letter of `requested` is present in `self`.
    pub fn grants(&self, requested: ModeSet) -> bool {
        self.0 & requested.0 == requested.0
    }
}

/// A principal scope a rule applies to: everyone, a named group, or a named
/// user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Scope {
    Any,
    Group(String),
    User(String),
}

impl Scope {
    fn parse(raw: &str) -> Scope {
        if raw == "*" {
            Scope::Any
        } else if let Some(group) = raw.strip_prefix("g:") {
            Scope::Group(group.to_owned())
        } else if let Some(user) = raw.strip_prefix("u:") {
            Scope::User(user.to_owned())
        } else {
            Scope::User(raw.to_owned())
        }
    }

    fn is_named(&self) -> bool {
        !matches!(self, Scope::Any)
    }

    fn matches(&self, user: Option<&str>, groups: &[String]) -> bool {
        match self {
            Scope::Any => true,
            Scope::Group(g) => groups.iter().any(|candidate| candidate == g),
            Scope::User(u) => user == Some(u.as_str()),
        }
    }
}

/// What a matching clause grants: unconditional allow/deny (always
/// terminating evaluation), or a letter-subset that only terminates
/// evaluation when written in uppercase.
enum Grant {
    All,
    None,
    Letters(ModeSet, bool),
}

fn parse_grant(raw: &str) -> Grant {
    match raw {
        "ALL" => Grant::All,
        "NONE" => Grant::None,
        _ => {
            let stop = raw.chars().any(|c| c.is_ascii_uppercase());
            Grant::Letters(ModeSet::parse(raw), stop)
        }
    }
}

struct Clause {
    scope: Scope,
    grant: Grant,
}

/// One line of a permissions hashfile: `^/admin/: g:admins=ALL ; *=NONE`.
pub struct Rule {
    pattern: Regex,
    clauses: Vec<Clause>,
}

#[derive(Default)]
pub struct PermissionTable {
    rules: Vec<Rule>,
}

impl PermissionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from the vhost's merged config, reading the
    /// `permissions` mapping (address-regex → rule text) in declared order.
    pub fn from_config(config: &ConfigLoader) -> Self {
        let mut table = PermissionTable::new();
        let Some(Node::Mapping(permissions)) = config.get("permissions") else {
            return table;
        };
        for (pattern, value) in permissions.0.iter() {
            if let Node::Scalar(crate::node::Scalar::Text(rule_text)) = value {
                if let Ok(rule) = parse_rule(pattern, rule_text) {
                    table.rules.push(rule);
                }
            }
        }
        table
    }

    /// Evaluates the table against `path` for `(user, groups)`, deciding
    /// whether every letter of `requested` is granted (§4.F):
    ///
    /// 1. For each pattern whose regex matches `path`, find the first clause
    ///    whose scope matches (`*` is skipped if an earlier clause in the
    ///    same pattern already matched a named scope).
    /// 2. `NONE` denies and stops; `ALL` allows and stops; otherwise the
    ///    clause allows iff its granted letters are a superset of
    ///    `requested` — uppercase letters stop evaluation with that result,
    ///    lowercase letters record it and fall through to later patterns.
    /// 3. If no pattern matched at all, allow. Otherwise return the last
    ///    recorded decision (default deny).
    pub fn check(&self, path: &str, user: Option<&str>, groups: &[String], requested: &str) -> bool {
        let requested = ModeSet::parse(requested);
        let mut matched_any_pattern = false;
        let mut last_decision: Option<bool> = None;

        for rule in &self.rules {
            if !rule.pattern.is_match(path) {
                continue;
            }
            matched_any_pattern = true;

            let mut prior_named_match = false;
            for clause in &rule.clauses {
                if matches!(clause.scope, Scope::Any) && prior_named_match {
                    continue;
                }
                if !clause.scope.matches(user, groups) {
                    continue;
                }
                if clause.scope.is_named() {
                    prior_named_match = true;
                }

                match &clause.grant {
                    Grant::None => return false,
                    Grant::All => return true,
                    Grant::Letters(granted, stop) => {
                        let allowed = granted.grants(requested);
                        if *stop {
                            return allowed;
                        }
                        last_decision = Some(allowed);
                        break;
                    }
                }
            }
        }

        if !matched_any_pattern {
            return true;
        }
        last_decision.unwrap_or(false)
    }
}

/// Parses `"g:admins=ALL ; *=NONE"` into a [`Rule`].
fn parse_rule(pattern: &str, text: &str) -> Result<Rule, regex::Error> {
    let regex = Regex::new(pattern)?;
    let mut clauses = Vec::new();

    for part in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        if let Some((scope, grant)) = part.split_once('=') {
            clauses.push(Clause {
                scope: Scope::parse(scope.trim()),
                grant: parse_grant(grant.trim()),
            });
        }
    }

    Ok(Rule { pattern: regex, clauses })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_scope_denies_then_stop_blocks_fallthrough() {
        let mut table = PermissionTable::new();
        table.rules.push(parse_rule("^/admin/", "g:admins=ALL ; *=NONE").unwrap());

        assert!(!table.check("/admin/panel", None, &[], "r"));
        assert!(table.check("/admin/panel", Some("root"), &["admins".to_owned()], "r"));
    }

    #[test]
    fn unmatched_path_defaults_to_public_read() {
        let table = PermissionTable::new();
        assert!(table.check("/anything", None, &[], "r"));
    }

    #[test]
    fn uppercase_letters_stop_lowercase_falls_through() {
        let mut table = PermissionTable::new();
        // Lowercase grant: records "allowed" for read, but does not stop,
        // so the next pattern still gets evaluated and its decision wins.
        table.rules.push(parse_rule("^/shared/", "*=r").unwrap());
        table.rules.push(parse_rule("^/shared/", "*=NONE").unwrap());

        assert!(!table.check("/shared/doc", None, &[], "r"));
    }

    #[test]
    fn uppercase_grant_stops_evaluation_immediately() {
        let mut table = PermissionTable::new();
        table.rules.push(parse_rule("^/shared/", "*=R").unwrap());
        table.rules.push(parse_rule("^/shared/", "*=NONE").unwrap());

        assert!(table.check("/shared/doc", None, &[], "r"));
    }

    #[test]
    fn requested_mode_must_be_a_subset_of_the_granted_letters() {
        let mut table = PermissionTable::new();
        table.rules.push(parse_rule("^/docs/", "u:alice=rw").unwrap());

        assert!(table.check("/docs/x", Some("alice"), &[], "r"));
        assert!(table.check("/docs/x", Some("alice"), &[], "w"));
        assert!(!table.check("/docs/x", Some("alice"), &[], "x"));
    }

    #[test]
    fn wildcard_is_suppressed_by_an_earlier_named_match_in_the_same_pattern() {
        let mut table = PermissionTable::new();
        // bob matches the named clause first; the wildcard clause, even
        // though it appears later, never gets to decide for him.
        table.rules.push(parse_rule("^/team/", "u:bob=r ; *=rwxvq").unwrap());

        assert!(table.check("/team/x", Some("bob"), &[], "r"));
        assert!(!table.check("/team/x", Some("bob"), &[], "w"));
    }
}
