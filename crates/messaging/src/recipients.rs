//! Recipient selection: derives the target student list for a dispatch.

use academy_core::types::{Recipient, StudentStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Read-only lookup of the full recipient collection.
pub trait RecipientSource: Send + Sync {
    /// All recipients in the store's canonical order.
    fn recipients(&self) -> Vec<Recipient>;
}

/// Selection rule applied to the recipient collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RecipientSelection {
    All,
    ByCourse { course: String },
    ByStatus { status: StudentStatus },
    ExplicitIds { ids: Vec<Uuid> },
}

impl RecipientSelection {
    /// Keep the recipients matching this rule, preserving input order.
    /// An empty result is not an error.
    pub fn apply(&self, recipients: &[Recipient]) -> Vec<Recipient> {
        match self {
            RecipientSelection::All => recipients.to_vec(),
            RecipientSelection::ByCourse { course } => recipients
                .iter()
                .filter(|r| r.course.as_deref() == Some(course.as_str()))
                .cloned()
                .collect(),
            RecipientSelection::ByStatus { status } => recipients
                .iter()
                .filter(|r| r.status == *status)
                .cloned()
                .collect(),
            RecipientSelection::ExplicitIds { ids } => {
                let wanted: HashSet<&Uuid> = ids.iter().collect();
                recipients
                    .iter()
                    .filter(|r| wanted.contains(&r.id))
                    .cloned()
                    .collect()
            }
        }
    }

    /// Resolve against a recipient store.
    pub fn select(&self, source: &dyn RecipientSource) -> Vec<Recipient> {
        let selected = self.apply(&source.recipients());
        tracing::debug!(
            selection = ?self,
            matched = selected.len(),
            "Recipients selected"
        );
        selected
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecipientSelection::All => "all",
            RecipientSelection::ByCourse { .. } => "by_course",
            RecipientSelection::ByStatus { .. } => "by_status",
            RecipientSelection::ExplicitIds { .. } => "explicit_ids",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str, course: Option<&str>, status: StudentStatus) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "+55 11 99999-0000".to_string(),
            course: course.map(str::to_string),
            status,
        }
    }

    fn roster() -> Vec<Recipient> {
        vec![
            student("Maria", Some("Piano"), StudentStatus::Active),
            student("João", Some("Guitar"), StudentStatus::Inactive),
            student("Ana", Some("Piano"), StudentStatus::OnHold),
            student("Pedro", None, StudentStatus::Active),
            student("Lucia", Some("Violin"), StudentStatus::Active),
        ]
    }

    #[test]
    fn test_all_returns_collection_in_order() {
        let all = roster();
        let selected = RecipientSelection::All.apply(&all);
        assert_eq!(selected, all);
    }

    #[test]
    fn test_by_status_is_subset() {
        let all = roster();
        let active = RecipientSelection::ByStatus {
            status: StudentStatus::Active,
        }
        .apply(&all);

        assert_eq!(active.len(), 3);
        assert!(active.iter().all(|r| r.status == StudentStatus::Active));
        assert!(active.iter().all(|r| all.contains(r)));
        let names: Vec<&str> = active.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Maria", "Pedro", "Lucia"]);
    }

    #[test]
    fn test_by_course_exact_match() {
        let all = roster();
        let piano = RecipientSelection::ByCourse {
            course: "Piano".to_string(),
        }
        .apply(&all);
        assert_eq!(piano.len(), 2);

        let lower = RecipientSelection::ByCourse {
            course: "piano".to_string(),
        }
        .apply(&all);
        assert!(lower.is_empty());
    }

    #[test]
    fn test_explicit_ids_keep_collection_order() {
        let all = roster();
        let ids = vec![all[4].id, all[0].id, all[4].id, Uuid::new_v4()];
        let selected = RecipientSelection::ExplicitIds { ids }.apply(&all);

        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].name, "Maria");
        assert_eq!(selected[1].name, "Lucia");
    }

    #[test]
    fn test_empty_result_is_valid() {
        let selected = RecipientSelection::ExplicitIds { ids: vec![] }.apply(&roster());
        assert!(selected.is_empty());
        assert!(RecipientSelection::All.apply(&[]).is_empty());
    }

    #[test]
    fn test_selection_wire_format() {
        let json = serde_json::json!({"mode": "by_status", "status": "active"});
        let sel: RecipientSelection = serde_json::from_value(json).unwrap();
        assert_eq!(
            sel,
            RecipientSelection::ByStatus {
                status: StudentStatus::Active
            }
        );
        let all: RecipientSelection = serde_json::from_value(serde_json::json!({"mode": "all"})).unwrap();
        assert_eq!(all.label(), "all");
    }
}
