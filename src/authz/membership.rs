use crate::models::project::{normalize_username, Project, ProjectMember};

/// Identifiers used to look a subject up in a project's member list.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemberKey<'a> {
    pub telegram_id: Option<i64>,
    pub username: Option<&'a str>,
}

impl<'a> MemberKey<'a> {
    pub fn username(username: &'a str) -> Self {
        Self {
            telegram_id: None,
            username: Some(username),
        }
    }
}

fn matches(member: &ProjectMember, telegram_id: Option<i64>, username: &str) -> bool {
    if let (Some(stored), Some(wanted)) = (member.telegram_id, telegram_id) {
        if stored == wanted {
            return true;
        }
    }
    !username.is_empty() && normalize_username(&member.username) == username
}

/// First member matching `key`, by Telegram id when both sides carry one, else by
/// normalized username.
pub fn find_member<'p>(project: &'p Project, key: MemberKey<'_>) -> Option<&'p ProjectMember> {
    let username = key.username.map(normalize_username).unwrap_or_default();
    project
        .members
        .iter()
        .find(|member| matches(member, key.telegram_id, &username))
}

/// Role the subject holds inside `project`, or `None` when not a member.
pub fn resolve_member_role<'p>(project: &'p Project, key: MemberKey<'_>) -> Option<&'p str> {
    find_member(project, key).map(|member| member.role.as_str())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn member(username: &str, role: &str, telegram_id: Option<i64>) -> ProjectMember {
        ProjectMember {
            username: username.to_string(),
            full_name: String::new(),
            role: role.to_string(),
            telegram_id,
        }
    }

    fn project(members: Vec<ProjectMember>) -> Project {
        Project {
            id: 1,
            title: "P".to_string(),
            description: String::new(),
            status: "in_progress".to_string(),
            members,
            version: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn username_match_ignores_case_and_at() {
        let p = project(vec![member("@Bob", "исполнитель", None)]);
        assert_eq!(resolve_member_role(&p, MemberKey::username("bob")), Some("исполнитель"));
        assert_eq!(resolve_member_role(&p, MemberKey::username(" @BOB ")), Some("исполнитель"));
        assert_eq!(resolve_member_role(&p, MemberKey::username("alice")), None);
    }

    #[test]
    fn telegram_id_match_wins_over_renamed_username() {
        let p = project(vec![member("old_name", "leader", Some(55))]);
        let key = MemberKey {
            telegram_id: Some(55),
            username: Some("new_name"),
        };
        assert_eq!(resolve_member_role(&p, key), Some("leader"));
    }

    #[test]
    fn first_match_wins() {
        let p = project(vec![
            member("carol", "developer", None),
            member("bob", "first", Some(7)),
            member("BOB", "second", None),
        ]);
        assert_eq!(resolve_member_role(&p, MemberKey::username("bob")), Some("first"));
    }

    #[test]
    fn empty_username_never_matches() {
        let p = project(vec![member("", "leader", None)]);
        assert_eq!(resolve_member_role(&p, MemberKey::username("")), None);
        assert_eq!(resolve_member_role(&p, MemberKey::default()), None);
    }
}
