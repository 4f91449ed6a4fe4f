//! Session <-> backing-store record conversion.
//!
//! Records are JSON objects:
//!
//! ```json
//! {"session_id": "abc", "history": [...], "boiler_info": {...},
//!  "summaries": [...], "created_at": "...", "updated_at": "..."}
//! ```
//!
//! Decoding is lenient about representation: any field may arrive as
//! structured JSON or as a JSON-encoded string, and missing or null fields
//! fall back to their empty defaults. Anything that still does not parse is
//! a decode error.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use crate::error::{Result, SessionError};
use crate::session::{BoilerInfo, Message, Session, Summary};

/// Full record, used for inserts.
pub(crate) fn encode(session: &Session) -> Result<Value> {
    let mut record = encode_changes(session)?;
    if let Value::Object(fields) = &mut record {
        fields.insert("session_id".into(), Value::String(session.id.clone()));
        fields.insert("created_at".into(), serde_json::to_value(session.created_at)?);
    }
    Ok(record)
}

/// Mutable fields only, used for updates.
pub(crate) fn encode_changes(session: &Session) -> Result<Value> {
    Ok(json!({
        "history": serde_json::to_value(&session.history)?,
        "boiler_info": serde_json::to_value(&session.boiler_info)?,
        "summaries": serde_json::to_value(&session.summaries)?,
        "updated_at": serde_json::to_value(session.updated_at)?,
    }))
}

/// Decode a stored record into a session with the given id.
pub(crate) fn decode(id: &str, record: Value) -> Result<Session> {
    let Value::Object(mut fields) = record else {
        return Err(SessionError::Decode {
            id: id.to_string(),
            reason: "record is not an object".to_string(),
        });
    };

    let history: Vec<Message> = field(id, &mut fields, &["history"])?.unwrap_or_default();
    let boiler_info: BoilerInfo =
        field(id, &mut fields, &["boiler_info", "boilerInfo"])?.unwrap_or_default();
    let summaries: Vec<Summary> = field(id, &mut fields, &["summaries"])?.unwrap_or_default();

    let now = Utc::now();
    let created_at: DateTime<Utc> =
        field(id, &mut fields, &["created_at", "createdAt"])?.unwrap_or(now);
    let updated_at: DateTime<Utc> =
        field(id, &mut fields, &["updated_at", "updatedAt"])?.unwrap_or(created_at);

    Ok(Session {
        id: id.to_string(),
        created_at,
        updated_at: updated_at.max(created_at),
        history,
        boiler_info,
        summaries,
        persisted: true,
        revision: 0,
    })
}

/// Pull a field out by any of its names and decode it.
fn field<T: DeserializeOwned>(
    id: &str,
    fields: &mut Map<String, Value>,
    names: &[&str],
) -> Result<Option<T>> {
    let Some(raw) = names.iter().find_map(|name| fields.remove(*name)) else {
        return Ok(None);
    };

    let decoded = match raw {
        Value::Null => return Ok(None),
        Value::String(text) => serde_json::from_str::<T>(&text)
            .or_else(|_| serde_json::from_value::<T>(Value::String(text))),
        other => serde_json::from_value::<T>(other),
    };

    decoded.map(Some).map_err(|e| SessionError::Decode {
        id: id.to_string(),
        reason: format!("field {}: {e}", names[0]),
    })
}
