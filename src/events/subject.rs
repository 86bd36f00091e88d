//! Subject (topic) naming and wildcard matching.
//!
//! Subjects are `.`-separated tokens:
//! - domain events: `{service}.project.{eventType}.{projectId}`
//! - per-user events: `{service}.user-project-events.{eventType}.{userId}`
//!
//! In patterns `*` matches exactly one token and a trailing `>` matches one
//! or more remaining tokens.

use super::EventType;

/// Default service name used as the first subject token.
pub const DEFAULT_SERVICE_NAME: &str = "todo-sv";
/// Domain token for project events.
pub const PROJECT_DOMAIN: &str = "project";
/// Domain token for per-user project events.
pub const USER_PROJECT_EVENTS_DOMAIN: &str = "user-project-events";

const SEPARATOR: char = '.';
const SINGLE_WILDCARD: &str = "*";
const TAIL_WILDCARD: &str = ">";

/// Builds subjects for one service namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectScheme {
    service: String,
}

impl SubjectScheme {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Subject for a domain event about one project.
    pub fn project_subject(&self, event_type: EventType, project_id: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.service, PROJECT_DOMAIN, event_type, project_id
        )
    }

    /// Pattern matching every domain event of every project.
    pub fn project_pattern(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.service, PROJECT_DOMAIN, SINGLE_WILDCARD, SINGLE_WILDCARD
        )
    }

    /// Personal subject a user's copy of an event is published to.
    ///
    /// Example: `todo-sv.user-project-events.PROJECT_CREATED.cao4dmp9d3pmus59pubg`
    pub fn user_events_subject(&self, event_type: EventType, user_id: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.service, USER_PROJECT_EVENTS_DOMAIN, event_type, user_id
        )
    }

    /// Pattern matching every event type on one user's personal subject.
    pub fn user_events_pattern(&self, user_id: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.service, USER_PROJECT_EVENTS_DOMAIN, SINGLE_WILDCARD, user_id
        )
    }

    /// Personal topic of one connected device.
    pub fn personal_topic(&self, user_id: &str, device_id: &str) -> PersonalTopic {
        PersonalTopic {
            subject: self.user_events_pattern(user_id),
            key: format!("{}:{}", user_id, device_id),
        }
    }
}

impl Default for SubjectScheme {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE_NAME)
    }
}

/// Subscription target for a `(user, device)` pair.
///
/// `subject` selects the user's events; `key` (`{userId}:{deviceId}`)
/// identifies the device's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PersonalTopic {
    pub subject: String,
    pub key: String,
}

/// True if `value` can stand as one literal subject token: non-empty, with
/// no separator, wildcard or whitespace.
pub fn is_subject_token(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c == SEPARATOR || c == '*' || c == '>' || c.is_whitespace())
}

/// Check whether a concrete subject matches a subscription pattern.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split(SEPARATOR);
    let mut subject_tokens = subject.split(SEPARATOR);

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (Some(TAIL_WILDCARD), Some(_)) => return pattern_tokens.next().is_none(),
            (Some(p), Some(s)) => {
                if p != SINGLE_WILDCARD && p != s {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_subject() {
        let scheme = SubjectScheme::default();
        assert_eq!(
            scheme.project_subject(EventType::ProjectUpdated, "abc"),
            "todo-sv.project.PROJECT_UPDATED.abc"
        );
        assert_eq!(scheme.project_pattern(), "todo-sv.project.*.*");
    }

    #[test]
    fn test_user_events_subject() {
        let scheme = SubjectScheme::new("svc");
        assert_eq!(
            scheme.user_events_subject(EventType::ProjectCreated, "42"),
            "svc.user-project-events.PROJECT_CREATED.42"
        );
    }

    #[test]
    fn test_personal_topic() {
        let topic = SubjectScheme::default().personal_topic("2", "1");
        assert_eq!(topic.subject, "todo-sv.user-project-events.*.2");
        assert_eq!(topic.key, "2:1");
    }

    #[test]
    fn test_subject_matches_exact() {
        assert!(subject_matches("a.b.c", "a.b.c"));
        assert!(!subject_matches("a.b.c", "a.b.d"));
        assert!(!subject_matches("a.b", "a.b.c"));
        assert!(!subject_matches("a.b.c", "a.b"));
    }

    #[test]
    fn test_subject_matches_single_wildcard() {
        assert!(subject_matches("todo-sv.project.*.*", "todo-sv.project.PROJECT_CREATED.1"));
        assert!(!subject_matches("todo-sv.project.*.*", "todo-sv.project.PROJECT_CREATED"));
        assert!(!subject_matches(
            "todo-sv.project.*.*",
            "todo-sv.user-project-events.PROJECT_CREATED.1"
        ));
    }

    #[test]
    fn test_subject_matches_tail_wildcard() {
        assert!(subject_matches("todo-sv.>", "todo-sv.project.PROJECT_CREATED.1"));
        assert!(subject_matches("todo-sv.>", "todo-sv.project"));
        assert!(!subject_matches("todo-sv.>", "todo-sv"));
        // `>` is only meaningful as the last token.
        assert!(!subject_matches("todo-sv.>.x", "todo-sv.project.x"));
    }

    #[test]
    fn test_is_subject_token() {
        assert!(is_subject_token("2"));
        assert!(is_subject_token("cao4dmp9d3pmus59pubg"));
        assert!(is_subject_token("user-42_x"));
        assert!(!is_subject_token(""));
        assert!(!is_subject_token("*"));
        assert!(!is_subject_token(">"));
        assert!(!is_subject_token("a.b"));
        assert!(!is_subject_token("a b"));
        assert!(!is_subject_token("a\tb"));
    }

    #[test]
    fn test_personal_pattern_matches_all_event_types() {
        let scheme = SubjectScheme::default();
        let pattern = scheme.user_events_pattern("2");
        for event_type in [
            EventType::ProjectCreated,
            EventType::ProjectUpdated,
            EventType::ProjectDeleted,
        ] {
            assert!(subject_matches(&pattern, &scheme.user_events_subject(event_type, "2")));
            assert!(!subject_matches(&pattern, &scheme.user_events_subject(event_type, "3")));
        }
    }
}
