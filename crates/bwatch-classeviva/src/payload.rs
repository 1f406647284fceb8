//! Payload normalization.
//!
//! The query endpoint has been observed returning the record list under a
//! `data` key, under a `comunicazioni` key, or as a bare array. Anything
//! else is `Unrecognized` and degrades to an empty batch in the caller.
//! Server-defined record order is preserved, never re-sorted.

use serde_json::Value;

use bwatch_core::domain::{AttachmentRef, Bulletin};

#[derive(Clone, Debug)]
pub enum Payload {
    Recognized(Vec<Bulletin>),
    Unrecognized,
}

pub(crate) fn parse(body: &Value) -> Payload {
    let records = match body {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("data").or_else(|| map.get("comunicazioni")) {
            Some(Value::Array(items)) => items,
            _ => return Payload::Unrecognized,
        },
        _ => return Payload::Unrecognized,
    };

    Payload::Recognized(records.iter().filter_map(bulletin_from_record).collect())
}

/// Records lacking any identifier are dropped; every other field falls
/// back to an empty default.
fn bulletin_from_record(record: &Value) -> Option<Bulletin> {
    let id = field(record, &["evtId", "id"])?;

    Some(Bulletin {
        id,
        title: field(record, &["evtText", "titolo"]).unwrap_or_default(),
        date: field(record, &["evtDatetimeBegin", "data"]).unwrap_or_default(),
        body: field(record, &["notes", "testo"]).unwrap_or_default(),
        read: record.get("letta").map(truthy).unwrap_or(true),
        attachments: structured_attachments(record),
    })
}

fn structured_attachments(record: &Value) -> Vec<AttachmentRef> {
    let Some(Value::Array(items)) = record.get("allegati") else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let id = field(item, &["allegato_id"])?;
            let filename = field(item, &["filename"])
                .unwrap_or_else(|| format!("allegato_{id}.pdf"));
            Some(AttachmentRef { id, filename })
        })
        .collect()
}

/// String or number, coerced to a string key.
fn field(record: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match record.get(key) {
            Some(Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !matches!(s.as_str(), "" | "0" | "false" | "no"),
        _ => false,
    }
}
