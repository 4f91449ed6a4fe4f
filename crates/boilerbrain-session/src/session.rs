//! The session entity and its parts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry in a conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Who sent the message. `role` is accepted when reading.
    #[serde(alias = "role")]
    pub sender: Sender,

    /// Message body. `content` is accepted when reading.
    #[serde(alias = "content")]
    pub text: String,

    /// When the message was recorded.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with the current time.
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Shorthand for a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Sender::User, text)
    }

    /// Shorthand for an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Sender::Assistant, text)
    }
}

/// A summary annotation attached to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    pub summary: String,
}

/// Diagnostic facts gathered about the boiler under discussion.
///
/// Every field is optional; updates are merged in rather than replacing the
/// whole record (see [`BoilerInfo::merge`]). Facts without a dedicated field
/// land in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoilerInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_number: Option<String>,

    /// combi, system or standard.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_type: Option<String>,

    /// Fault codes seen so far, first-seen order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fault_codes: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub detected_issues: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BoilerInfo {
    /// Merge `other` into `self`.
    ///
    /// Scalars present in `other` overwrite. Lists are unioned, keeping
    /// first-seen order. `extra` objects merge recursively; any other
    /// `extra` value in `other` overwrites.
    pub fn merge(&mut self, other: BoilerInfo) {
        merge_opt(&mut self.manufacturer, other.manufacturer);
        merge_opt(&mut self.model, other.model);
        merge_opt(&mut self.gc_number, other.gc_number);
        merge_opt(&mut self.system_type, other.system_type);
        union(&mut self.fault_codes, other.fault_codes);
        union(&mut self.components, other.components);
        union(&mut self.detected_issues, other.detected_issues);
        for (key, value) in other.extra {
            match self.extra.get_mut(&key) {
                Some(existing) => merge_value(existing, value),
                None => {
                    self.extra.insert(key, value);
                }
            }
        }
    }

    /// Builder: set the manufacturer.
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Builder: set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builder: record a fault code.
    pub fn with_fault_code(mut self, code: impl Into<String>) -> Self {
        self.fault_codes.push(code.into());
        self
    }
}

fn merge_opt(target: &mut Option<String>, incoming: Option<String>) {
    if incoming.is_some() {
        *target = incoming;
    }
}

fn union(target: &mut Vec<String>, incoming: Vec<String>) {
    for item in incoming {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

fn merge_value(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(existing), Value::Object(fields)) => {
            for (key, value) in fields {
                match existing.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// A conversation's state.
///
/// `id` never changes after creation. `updated_at` only moves forward: it is
/// bumped on every cache hit as well as on every write, so it records the
/// last touch rather than the last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<Message>,
    pub boiler_info: BoilerInfo,
    pub summaries: Vec<Summary>,

    /// Set once a write to the backing store has succeeded. Local
    /// bookkeeping only; the store may still lag.
    #[serde(skip)]
    pub persisted: bool,

    /// Number of local mutations applied to this copy.
    #[serde(skip)]
    pub revision: u64,
}

impl Session {
    /// Create an empty session.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            history: Vec::new(),
            boiler_info: BoilerInfo::default(),
            summaries: Vec::new(),
            persisted: false,
            revision: 0,
        }
    }

    /// Bump `updated_at` to now, never moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Apply an update: replace history if given, merge boiler info if given.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(history) = update.history {
            self.history = history;
        }
        if let Some(info) = update.boiler_info {
            self.boiler_info.merge(info);
        }
        self.revision += 1;
        self.touch();
    }

    /// Append a summary annotation.
    pub fn push_summary(&mut self, summary: impl Into<String>) {
        self.summaries.push(Summary {
            timestamp: Utc::now(),
            summary: summary.into(),
        });
        self.revision += 1;
        self.touch();
    }
}

/// Changes to apply to a session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    /// Replaces the whole history when present.
    pub history: Option<Vec<Message>>,
    /// Merged into the existing boiler info when present.
    pub boiler_info: Option<BoilerInfo>,
}

impl SessionUpdate {
    /// An update that changes nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the history.
    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = Some(history);
        self
    }

    /// Merge in boiler info.
    pub fn with_boiler_info(mut self, info: BoilerInfo) -> Self {
        self.boiler_info = Some(info);
        self
    }
}
