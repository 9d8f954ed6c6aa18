//! ---
//! pv_section: "02-engine-messaging"
//! pv_subsection: "module"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Engine message envelope, dispatch and transports."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::{EngineDispatcher, EngineResponse, Result};

#[derive(Debug, Deserialize)]
struct ReplayRecord {
    #[serde(default)]
    delay_ms: Option<u64>,
    response: EngineResponse,
}

/// Replay recorded engine responses from a newline-delimited JSON file.
///
/// Each line holds an object with a `response` field and an optional
/// `delay_ms` field to simulate time between responses. Replay stops at the
/// first line that fails to parse or whose callbacks fail.
pub fn replay_responses<P: AsRef<Path>>(dispatcher: &EngineDispatcher, path: P) -> Result<usize> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut count = 0usize;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line)?;
        if let Some(delay) = record.delay_ms {
            std::thread::sleep(Duration::from_millis(delay));
        }
        dispatcher.deliver(&record.response)?;
        count += 1;
    }

    Ok(count)
}
