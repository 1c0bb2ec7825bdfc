use std::path::{Path, PathBuf};

use blendbridge::{BlendWriter, SceneNode, SourceMap};
use blendbridge_error::Result;

use crate::util::{self, FileNode};

pub fn cmd_write(
    settings: &Path,
    tool: Option<&Path>,
    destination: &Path,
    sources: &[PathBuf],
) -> Result<()> {
    let mut config = util::load_config(settings, tool)?;
    let runner = util::verified_runner(&mut config)?;

    let nodes: Vec<FileNode> = sources.iter().map(|s| FileNode::new(s)).collect();
    let refs: Vec<&dyn SceneNode> = nodes.iter().map(|n| n as &dyn SceneNode).collect();

    let writer = BlendWriter::new(&runner);
    let handle = writer.write(destination, &refs, &SourceMap::new())?;
    handle.wait()?;
    println!("wrote {}", destination.display());
    Ok(())
}
