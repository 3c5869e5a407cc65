//! Authorization: role parsing, project membership and the access policy.
//!
//! Role strings are free text and may carry several roles at once
//! (`"Руководитель, Модератор"`). They are only ever inspected through
//! [`RoleSet`] and the predicates in [`roles`].

mod engine;
pub mod membership;
pub mod roles;

pub use engine::{guard_member_role, AccessPolicy};
pub use membership::{find_member, resolve_member_role, MemberKey};
pub use roles::{parse_roles, RoleSet};

/// Recognised role tags, lower-case. Russian and English spellings are synonyms.
pub mod tags {
    pub const ADMIN: &[&str] = &["админ", "admin", "владелец", "owner"];
    pub const MODERATOR: &[&str] = &["модератор", "moderator"];
    pub const LEADER: &[&str] = &["руководитель", "leader"];
    pub const DEVELOPER: &[&str] = &["разработчик", "developer"];

    /// Tag appended when a leader role is written without a moderator tag.
    pub const MODERATOR_LABEL: &str = "Модератор";
}
