//! Deterministic sample data.
//!
//! Timestamps are chosen so that differences are exact in binary floating
//! point and snapshots stay stable.

use anyhow::Result;
use debugkit_storage::{Record, Storage};
use serde_json::json;

pub const REQUEST_ID: &str = "0123456789abcdef0123456789abcdef";

pub const START: f64 = 100.25;
pub const END: f64 = 102.75;

/// `(request id, handler key, record)` triples spread over two requests.
pub fn sample_records() -> Vec<(&'static str, &'static str, Record)> {
    vec![
        (
            REQUEST_ID,
            "message",
            Record::new("message", json!([{"message": "boot", "timestamp": START}])),
        ),
        (
            REQUEST_ID,
            "time",
            Record::new("time", json!({"start": START, "end": END, "elapsed": 2.5}))
                .with_timing(Some(START), Some(END), Some(2.5)),
        ),
        (
            "fedcba9876543210fedcba9876543210",
            "boot-time",
            Record::new("boot-time", json!({"start": 1.5, "end": 2.0, "elapsed": 0.5}))
                .with_timing(Some(1.5), Some(2.0), Some(0.5)),
        ),
    ]
}

pub fn seed(storage: &dyn Storage) -> Result<()> {
    for (id, name, record) in sample_records() {
        storage.save(id, name, &record)?;
    }
    Ok(())
}
