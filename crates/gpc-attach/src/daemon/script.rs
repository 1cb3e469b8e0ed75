//! Replay scripts: a JSON array of dataplane events.

use std::fs;
use std::path::Path;

use vplane_npf_common::DataplaneEvent;

use super::config::DaemonError;

pub fn parse(text: &str) -> Result<Vec<DataplaneEvent>, DaemonError> {
    Ok(serde_json::from_str(text)?)
}

pub fn load(path: &Path) -> Result<Vec<DataplaneEvent>, DaemonError> {
    let text = fs::read_to_string(path).map_err(|source| DaemonError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}
