//! Placeholder substitution for message templates.
//!
//! Bodies carry `{token}` markers. Rendering is one left-to-right pass over
//! the body: each marker naming a declared [`Token`] that has a value is
//! replaced and anything else is copied verbatim. Substituted text is never
//! re-scanned.

use academy_core::error::{AcademyError, AcademyResult};
use academy_core::types::{MessageTemplate, Recipient};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Read-only lookup of stored templates.
pub trait TemplateSource: Send + Sync {
    fn template(&self, id: &Uuid) -> Option<MessageTemplate>;
}

/// Declared placeholder tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Token {
    Name,
    Course,
    Phone,
    Time,
    Date,
    Amount,
    DaysRemaining,
    SchoolName,
}

impl Token {
    pub const ALL: [Token; 8] = [
        Token::Name,
        Token::Course,
        Token::Phone,
        Token::Time,
        Token::Date,
        Token::Amount,
        Token::DaysRemaining,
        Token::SchoolName,
    ];

    /// Placeholder name as written between braces.
    pub fn key(&self) -> &'static str {
        match self {
            Token::Name => "name",
            Token::Course => "course",
            Token::Phone => "phone",
            Token::Time => "time",
            Token::Date => "date",
            Token::Amount => "amount",
            Token::DaysRemaining => "days_remaining",
            Token::SchoolName => "school_name",
        }
    }

    pub fn parse(key: &str) -> Option<Token> {
        Token::ALL.into_iter().find(|t| t.key() == key)
    }
}

/// Values available to one rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateValues {
    values: HashMap<Token, String>,
}

impl TemplateValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, token: Token, value: impl Into<String>) -> Self {
        self.set(token, value);
        self
    }

    pub fn set(&mut self, token: Token, value: impl Into<String>) {
        self.values.insert(token, value.into());
    }

    pub fn get(&self, token: Token) -> Option<&str> {
        self.values.get(&token).map(String::as_str)
    }

    /// Build from a placeholder-name map, as received over the API.
    /// Names outside the token table are rejected.
    pub fn from_map(map: &HashMap<String, String>) -> AcademyResult<Self> {
        let mut values = Self::new();
        for (key, value) in map {
            let token = Token::parse(key).ok_or_else(|| {
                AcademyError::Validation(format!("unknown placeholder '{{{key}}}'"))
            })?;
            values.set(token, value.clone());
        }
        Ok(values)
    }

    /// Global values overlaid with the recipient's own name, phone and
    /// course. Recipient values win.
    pub fn for_recipient(&self, recipient: &Recipient) -> Self {
        let mut values = self.clone();
        values.set(Token::Name, recipient.name.clone());
        values.set(Token::Phone, recipient.phone.clone());
        if let Some(course) = &recipient.course {
            values.set(Token::Course, course.clone());
        }
        values
    }
}

/// Single-pass renderer over the declared token table.
pub struct TemplateRenderer {
    table: HashMap<&'static str, Token>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let table = Token::ALL.into_iter().map(|t| (t.key(), t)).collect();
        Self { table }
    }

    pub fn render(&self, body: &str, values: &TemplateValues) -> String {
        let mut out = String::with_capacity(body.len());
        let mut rest = body;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            if let Some(end) = after.find(['{', '}']) {
                if after.as_bytes()[end] == b'}' {
                    let key = &after[..end];
                    let value = self
                        .table
                        .get(key)
                        .and_then(|token| values.get(*token));
                    if let Some(value) = value {
                        out.push_str(value);
                        rest = &after[end + 1..];
                        continue;
                    }
                }
            }

            out.push('{');
            rest = after;
        }

        out.push_str(rest);
        out
    }

    /// Render for one recipient, merging per-recipient values over globals.
    pub fn render_for(&self, body: &str, recipient: &Recipient, globals: &TemplateValues) -> String {
        self.render(body, &globals.for_recipient(recipient))
    }

    /// Declared tokens used by a body, in order of first appearance.
    pub fn placeholders_in(&self, body: &str) -> Vec<Token> {
        let mut found = Vec::new();
        let mut rest = body;
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find(['{', '}']) {
                Some(end) if after.as_bytes()[end] == b'}' => {
                    if let Some(token) = self.table.get(&after[..end]) {
                        if !found.contains(token) {
                            found.push(*token);
                        }
                    }
                    rest = &after[end + 1..];
                }
                _ => rest = after,
            }
        }
        found
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}
