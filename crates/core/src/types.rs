use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Enrolment status of a student. Used for recipient selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum StudentStatus {
    Active,
    Inactive,
    OnHold,
}

impl StudentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudentStatus::Active => "active",
            StudentStatus::Inactive => "inactive",
            StudentStatus::OnHold => "on_hold",
        }
    }
}

/// A student who can be targeted by a mass message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Recipient {
    pub id: Uuid,
    pub name: String,
    /// WhatsApp contact number, free-form as typed in the back office.
    pub phone: String,
    pub course: Option<String>,
    pub status: StudentStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Welcome,
    Reminder,
    Payment,
    Event,
    General,
}

/// A reusable message body with `{token}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub name: String,
    pub category: TemplateCategory,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ─── Dispatch ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DispatchState {
    Idle,
    Sending,
    Completed,
    Cancelled,
    /// The run stopped abnormally; counters hold what was processed.
    Aborted,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Completed | DispatchState::Cancelled | DispatchState::Aborted
        )
    }
}

/// Running counters of one dispatch. `succeeded + failed` is the number of
/// recipients processed so far and never exceeds `total`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DispatchProgress {
    pub state: DispatchState,
    pub succeeded: usize,
    pub failed: usize,
    pub total: usize,
    /// Completion percentage, 0..=100.
    pub progress: u8,
}

impl DispatchProgress {
    pub fn idle() -> Self {
        Self {
            state: DispatchState::Idle,
            succeeded: 0,
            failed: 0,
            total: 0,
            progress: 0,
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl Default for DispatchProgress {
    fn default() -> Self {
        Self::idle()
    }
}

/// `round(processed / total * 100)`. An empty run counts as fully complete.
pub fn progress_percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (processed.min(total) as f64 / total as f64 * 100.0).round();
    pct as u8
}
