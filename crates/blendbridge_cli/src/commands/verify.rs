use std::path::Path;

use blendbridge::BlenderConfig;
use blendbridge_error::{BridgeError, Result};

use crate::util;

pub fn cmd_verify(settings: &Path, tool: Option<&Path>) -> Result<()> {
    let mut config = util::load_config(settings, tool)?;
    if config.tool_path.is_none() {
        config.tool_path = BlenderConfig::detect_tool_path();
    }
    let path = config.tool_path.clone().ok_or_else(|| {
        BridgeError::config_tool_unset("no tool path is configured and none was auto-detected")
    })?;

    if config.verify()? {
        println!("verified: {}", path.display());
    } else {
        println!("outdated: {}", path.display());
    }
    config.save(settings)?;
    Ok(())
}
