use std::path::Path;

use blendbridge::count::count_mesh_objects;
use blendbridge_error::Result;

use crate::util;

pub fn cmd_count(settings: &Path, tool: Option<&Path>, file: &Path) -> Result<()> {
    let mut config = util::load_config(settings, tool)?;
    let runner = util::verified_runner(&mut config)?;
    let count = count_mesh_objects(&runner, file)?;
    println!("{count}");
    Ok(())
}
