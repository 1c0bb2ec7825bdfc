use std::path::{Path, PathBuf};

use blendbridge::open::{resolve_open_target, ToolLauncher};
use blendbridge::{SceneNode, SourceMap};
use blendbridge_error::Result;

use crate::util::{self, ConsoleNotifier, FileNode};

pub fn cmd_open(
    settings: &Path,
    tool: Option<&Path>,
    sources: &[PathBuf],
    close_others: bool,
) -> Result<()> {
    let mut config = util::load_config(settings, tool)?;
    let runner = util::verified_runner(&mut config)?;

    let nodes: Vec<FileNode> = sources.iter().map(|s| FileNode::new(s)).collect();
    let refs: Vec<&dyn SceneNode> = nodes.iter().map(|n| n as &dyn SceneNode).collect();
    let target = resolve_open_target(&refs, &SourceMap::new())?;

    let notifier = ConsoleNotifier;
    let launcher = ToolLauncher::new(&config, &runner, &notifier);
    if close_others {
        launcher.close_other_instances()?;
    }
    let opened = launcher.open(&target)?;
    println!("opened {}", opened.display());
    Ok(())
}
