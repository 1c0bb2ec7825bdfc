//! The batch-mode program executed inside the external tool.
//!
//! The script is compiled into the binary and written to a temporary file on
//! demand; the file lives as long as its handle, so a runner materializes it
//! once and reuses it for every job.

use std::io::Write;
use std::path::Path;

use blendbridge_error::{BridgeError, Result};
use tempfile::NamedTempFile;

/// The embedded batch program source.
pub const BATCH_SCRIPT: &str = include_str!("../assets/bridge_api.py");

/// An on-disk copy of [`BATCH_SCRIPT`], removed again on drop.
#[derive(Debug)]
pub struct ScriptHandle {
    file: NamedTempFile,
}

impl ScriptHandle {
    pub fn materialize() -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("blendbridge_api_")
            .suffix(".py")
            .tempfile()
            .map_err(|e| BridgeError::io(format!("cannot create script file: {e}")))?;
        file.write_all(BATCH_SCRIPT.as_bytes())
            .map_err(|e| BridgeError::io(format!("cannot write script file: {e}")))?;
        file.flush()
            .map_err(|e| BridgeError::io(format!("cannot flush script file: {e}")))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialized_script_matches_the_embedded_source() {
        let handle = ScriptHandle::materialize().unwrap();
        let on_disk = std::fs::read_to_string(handle.path()).unwrap();
        assert_eq!(on_disk, BATCH_SCRIPT);
    }

    #[test]
    fn script_file_is_removed_on_drop() {
        let path = {
            let handle = ScriptHandle::materialize().unwrap();
            handle.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
