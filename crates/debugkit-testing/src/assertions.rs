//! Custom assertions for debugkit-specific validation.

use anyhow::{Context, Result};
use debugkit_types::Level;
use serde_json::Value;

use crate::{RecordingLogger, TestWorld};

/// Assert the id is 32 lowercase hex characters.
pub fn assert_request_id(id: &str) -> Result<()> {
    if id.len() != 32 {
        anyhow::bail!("Expected a 32 character request id, got {} ({:?})", id.len(), id);
    }
    if !id.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
        anyhow::bail!("Request id {:?} is not lowercase hex", id);
    }
    Ok(())
}

pub fn assert_no_log_files(world: &TestWorld) -> Result<()> {
    let files = world.log_files()?;
    if !files.is_empty() {
        anyhow::bail!("Expected an empty storage directory, found {:?}", files);
    }
    Ok(())
}

/// Assert every logged call used `level`, and that there was at least one.
pub fn assert_logged_at(logger: &RecordingLogger, level: Level) -> Result<()> {
    let records = logger.records();
    if records.is_empty() {
        anyhow::bail!("Expected at least one log call at {}", level);
    }
    for record in &records {
        if record.level != level {
            anyhow::bail!(
                "Log call {:?} used level {} but expected {}",
                record.message,
                record.level,
                level
            );
        }
    }
    Ok(())
}

/// Assert a collected report has exactly the given handler keys.
pub fn assert_report_keys(report: &Value, expected: &[&str]) -> Result<()> {
    let object = report
        .as_object()
        .context("Expected the report to be a JSON object")?;

    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    let mut expected = expected.to_vec();
    keys.sort_unstable();
    expected.sort_unstable();

    if keys != expected {
        anyhow::bail!("Expected report keys {:?}, got {:?}", expected, keys);
    }
    Ok(())
}
