//! Read the run configuration from JSON.
//!
//! Every field is optional; missing fields take their defaults.

use std::fs::File;
use std::path::Path;

use crate::domain::CalibConfig;
use crate::error::AppError;

pub fn read_config_json(path: &Path) -> Result<CalibConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open config JSON '{}': {e}", path.display())))?;
    let config: CalibConfig =
        serde_json::from_reader(file).map_err(|e| AppError::config(format!("Invalid config JSON: {e}")))?;
    Ok(config)
}
