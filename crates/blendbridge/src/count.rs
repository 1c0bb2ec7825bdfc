//! Counting mesh objects in a native file.

use std::path::Path;

use blendbridge_error::{BridgeError, Result};
use log::debug;

use crate::invoker::{ConversionJob, ToolRunner};

/// Extracts the count from captured tool output.
///
/// The tool prints banner and log noise before the real output, so the first
/// line that parses as a non-negative integer wins.
pub fn parse_count(stdout: &str) -> Option<usize> {
    stdout.lines().find_map(|line| line.trim().parse().ok())
}

/// Counts the mesh-type, visible objects in `file`.
///
/// Unreadable output is a hard error; defaulting to 0 or 1 here would
/// silently misroute the read between the single and split paths.
pub fn count_mesh_objects(runner: &dyn ToolRunner, file: &Path) -> Result<usize> {
    let output = runner.run(&ConversionJob::count(file))?;
    if !output.success {
        return Err(
            BridgeError::convert_tool_failed("counting objects failed").with_file_path(file)
        );
    }
    match parse_count(&output.stdout) {
        Some(count) => {
            debug!("{} contains {} mesh object(s)", file.display(), count);
            Ok(count)
        }
        None => Err(BridgeError::convert_count_unreadable(
            "no line of the tool output parsed as an object count",
        )
        .with_file_path(file)),
    }
}
