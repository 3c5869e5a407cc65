use std::collections::BTreeSet;
use std::fmt;

use super::tags;

/// Normalized set of lower-case role tags parsed from a free-text role string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet {
    tags: BTreeSet<String>,
}

fn is_delimiter(c: char) -> bool {
    matches!(c, ',' | '/' | ';' | '|' | '+') || c.is_whitespace()
}

impl RoleSet {
    pub fn parse(text: &str) -> Self {
        let tags = text
            .to_lowercase()
            .split(is_delimiter)
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
        Self { tags }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn contains_any(&self, candidates: &[&str]) -> bool {
        candidates.iter().any(|tag| self.contains(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    pub fn is_admin(&self) -> bool {
        self.contains_any(tags::ADMIN)
    }

    pub fn is_moderator(&self) -> bool {
        self.contains_any(tags::MODERATOR)
    }

    pub fn is_leader(&self) -> bool {
        self.contains_any(tags::LEADER)
    }

    pub fn is_developer(&self) -> bool {
        self.contains_any(tags::DEVELOPER)
    }
}

/// Canonical form: tags in sorted order joined by `", "`.
impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for tag in &self.tags {
            if !first {
                f.write_str(", ")?;
            }
            f.write_str(tag)?;
            first = false;
        }
        Ok(())
    }
}

pub fn parse_roles(text: &str) -> RoleSet {
    RoleSet::parse(text)
}

pub fn is_admin(role: &str) -> bool {
    parse_roles(role).is_admin()
}

pub fn is_moderator(role: &str) -> bool {
    parse_roles(role).is_moderator()
}

pub fn is_leader(role: &str) -> bool {
    parse_roles(role).is_leader()
}

pub fn is_developer(role: &str) -> bool {
    parse_roles(role).is_developer()
}

pub fn can_manage_members(role: &str) -> bool {
    is_admin(role)
}

pub fn can_manage_tasks(role: &str) -> bool {
    let roles = parse_roles(role);
    roles.is_admin() || roles.is_moderator() || roles.is_leader()
}

pub fn can_review_completions(role: &str) -> bool {
    can_manage_tasks(role)
}

/// Leaders always carry the moderator tag as well. Enforced where role strings are written.
pub fn must_include_moderator(role: &str) -> bool {
    is_leader(role)
}

/// A developer can not simultaneously hold an admin-level tag.
pub fn invalid_role_combination(role: &str) -> bool {
    let roles = parse_roles(role);
    roles.is_developer() && roles.is_admin()
}
