//! Removal of sensitive fields before records leave the trust boundary.

use serde_json::Value;

use crate::models::Record;

/// Keys that never reach a prompt or a response.
pub const DENY_LIST: [&str; 3] = ["passwordHash", "ssn", "creditCard"];

/// Removes every deny-listed key from every record, at any nesting depth.
pub fn strip(records: Vec<Record>) -> Vec<Record> {
    records.into_iter().map(strip_record).collect()
}

fn strip_record(mut record: Record) -> Record {
    record.retain(|key, _| !DENY_LIST.contains(&key.as_str()));
    for value in record.values_mut() {
        strip_value(value);
    }
    record
}

fn strip_value(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let cleaned = strip_record(std::mem::take(map));
            *map = cleaned;
        }
        Value::Array(items) => items.iter_mut().for_each(strip_value),
        _ => {}
    }
}
