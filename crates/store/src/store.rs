//! In-memory directory store backed by DashMap.

use academy_core::error::{AcademyError, AcademyResult};
use academy_core::types::{MessageTemplate, Recipient, StudentStatus, TemplateCategory};
use academy_messaging::{RecipientSource, TemplateSource};
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTemplateRequest {
    pub name: String,
    pub category: TemplateCategory,
    pub body: String,
}

/// Thread-safe store for students and message templates. Listings come back
/// in insertion order.
pub struct DirectoryStore {
    students: DashMap<Uuid, (u64, Recipient)>,
    templates: DashMap<Uuid, (u64, MessageTemplate)>,
    seq: AtomicU64,
}

impl DirectoryStore {
    pub fn new() -> Self {
        Self {
            students: DashMap::new(),
            templates: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Store pre-filled with a small roster and the standard templates.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        store.seed_demo_data();
        info!(
            students = store.students.len(),
            templates = store.templates.len(),
            "Directory store initialized (in-memory, development mode)"
        );
        store
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    // ─── Students ──────────────────────────────────────────────────────────

    pub fn list_students(&self) -> Vec<Recipient> {
        let mut rows: Vec<(u64, Recipient)> =
            self.students.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, student)| student).collect()
    }

    pub fn get_student(&self, id: Uuid) -> Option<Recipient> {
        self.students.get(&id).map(|r| r.value().1.clone())
    }

    /// Insert or replace a student. Replacing keeps the original position.
    pub fn upsert_student(&self, student: Recipient) {
        let seq = self
            .students
            .get(&student.id)
            .map(|r| r.value().0)
            .unwrap_or_else(|| self.next_seq());
        self.students.insert(student.id, (seq, student));
    }

    // ─── Templates ─────────────────────────────────────────────────────────

    pub fn list_templates(&self) -> Vec<MessageTemplate> {
        let mut rows: Vec<(u64, MessageTemplate)> =
            self.templates.iter().map(|r| r.value().clone()).collect();
        rows.sort_by_key(|(seq, _)| *seq);
        rows.into_iter().map(|(_, template)| template).collect()
    }

    pub fn get_template(&self, id: Uuid) -> Option<MessageTemplate> {
        self.templates.get(&id).map(|r| r.value().1.clone())
    }

    pub fn create_template(&self, req: CreateTemplateRequest) -> AcademyResult<MessageTemplate> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(AcademyError::Validation("template name must not be empty".to_string()));
        }
        if req.body.trim().is_empty() {
            return Err(AcademyError::Validation("template body must not be empty".to_string()));
        }

        let template = MessageTemplate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category: req.category,
            body: req.body,
            created_at: Utc::now(),
        };
        let seq = self.next_seq();
        self.templates.insert(template.id, (seq, template.clone()));
        info!(template_id = %template.id, name = %template.name, "Template created");
        Ok(template)
    }

    pub fn delete_template(&self, id: Uuid) -> bool {
        let removed = self.templates.remove(&id).is_some();
        if removed {
            info!(template_id = %id, "Template deleted");
        }
        removed
    }

    // ─── Seed data ─────────────────────────────────────────────────────────

    fn seed_demo_data(&self) {
        let roster = [
            ("Maria Silva", "+55 11 91234-0001", Some("Piano"), StudentStatus::Active),
            ("João Pereira", "+55 11 91234-0002", Some("Guitar"), StudentStatus::Active),
            ("Ana Costa", "+55 11 91234-0003", Some("Violin"), StudentStatus::OnHold),
            ("Pedro Santos", "+55 11 91234-0004", Some("Piano"), StudentStatus::Inactive),
            ("Lucia Almeida", "+55 11 91234-0005", Some("Voice"), StudentStatus::Active),
            ("Rafael Lima", "+55 11 91234-0006", None, StudentStatus::Active),
        ];
        for (name, phone, course, status) in roster {
            self.upsert_student(Recipient {
                id: Uuid::new_v4(),
                name: name.to_string(),
                phone: phone.to_string(),
                course: course.map(str::to_string),
                status,
            });
        }

        let templates = [
            (
                "Welcome",
                TemplateCategory::Welcome,
                "Welcome to {school_name}, {name}! Your {course} lessons start soon.",
            ),
            (
                "Class reminder",
                TemplateCategory::Reminder,
                "Hi {name}, reminder: your {course} class is today at {time}.",
            ),
            (
                "Payment due",
                TemplateCategory::Payment,
                "Hi {name}, your tuition of {amount} is due in {days_remaining} days.",
            ),
            (
                "Recital",
                TemplateCategory::Event,
                "{school_name} recital on {date} at {time}. See you there, {name}!",
            ),
        ];
        for (name, category, body) in templates {
            if let Err(e) = self.create_template(CreateTemplateRequest {
                name: name.to_string(),
                category,
                body: body.to_string(),
            }) {
                warn!(template = name, error = %e, "Failed to seed template");
            }
        }
    }
}

impl Default for DirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipientSource for DirectoryStore {
    fn recipients(&self) -> Vec<Recipient> {
        self.list_students()
    }
}

impl TemplateSource for DirectoryStore {
    fn template(&self, id: &Uuid) -> Option<MessageTemplate> {
        self.get_template(*id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_messaging::RecipientSelection;

    fn student(name: &str, status: StudentStatus) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            name: name.to_string(),
            phone: "5511900000000".to_string(),
            course: None,
            status,
        }
    }

    #[test]
    fn test_students_keep_insertion_order() {
        let store = DirectoryStore::new();
        let names = ["Zoe", "Ana", "Mia", "Bia"];
        for name in names {
            store.upsert_student(student(name, StudentStatus::Active));
        }
        let listed: Vec<String> = store.list_students().into_iter().map(|s| s.name).collect();
        assert_eq!(listed, names);
    }

    #[test]
    fn test_upsert_keeps_position() {
        let store = DirectoryStore::new();
        let first = student("First", StudentStatus::Active);
        store.upsert_student(first.clone());
        store.upsert_student(student("Second", StudentStatus::Active));

        let mut renamed = first.clone();
        renamed.name = "First (renamed)".to_string();
        store.upsert_student(renamed);

        let listed = store.list_students();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].name, "First (renamed)");
    }

    #[test]
    fn test_template_crud() {
        let store = DirectoryStore::new();
        let created = store
            .create_template(CreateTemplateRequest {
                name: "  Reminder ".to_string(),
                category: TemplateCategory::Reminder,
                body: "Hi {name}".to_string(),
            })
            .unwrap();
        assert_eq!(created.name, "Reminder");
        assert_eq!(store.template(&created.id).unwrap().body, "Hi {name}");

        assert!(store.delete_template(created.id));
        assert!(!store.delete_template(created.id));
        assert!(store.get_template(created.id).is_none());
    }

    #[test]
    fn test_template_validation() {
        let store = DirectoryStore::new();
        let err = store
            .create_template(CreateTemplateRequest {
                name: "Empty".to_string(),
                category: TemplateCategory::General,
                body: "   ".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, AcademyError::Validation(_)));
    }

    #[test]
    fn test_demo_data_selection() {
        let store = DirectoryStore::with_demo_data();
        assert_eq!(store.list_students().len(), 6);
        assert_eq!(store.list_templates().len(), 4);

        let active = RecipientSelection::ByStatus {
            status: StudentStatus::Active,
        }
        .select(&store);
        assert_eq!(active.len(), 4);

        let piano = RecipientSelection::ByCourse {
            course: "Piano".to_string(),
        }
        .select(&store);
        assert_eq!(piano.len(), 2);
    }
}
