use std::path::{Path, PathBuf};

use blendbridge::{ChangeEvent, ReloadWatcher, WatchOptions};
use blendbridge_error::Result;

use crate::util;

pub fn cmd_watch(settings: &Path, tool: Option<&Path>, files: &[PathBuf]) -> Result<()> {
    let config = util::load_config(settings, tool)?;
    let mut watcher = ReloadWatcher::spawn(WatchOptions {
        live_reload: config.live_reload,
        ..Default::default()
    })?;
    for file in files {
        watcher.watch_path(file)?;
        println!("watching {}", file.display());
    }

    for event in watcher.events().iter() {
        match event {
            ChangeEvent::SourceChanged { path, reference } => match reference.split_index {
                Some(index) => println!(
                    "changed: object {} of {} ({})",
                    index + 1,
                    reference.original_path.display(),
                    path.display()
                ),
                None => println!("changed: {}", path.display()),
            },
            ChangeEvent::ForeignExportChanged { path } => {
                println!("edited scene saved: {}", path.display());
            }
            ChangeEvent::BackupDropped { path } => {
                println!("dropped backup: {}", path.display());
            }
        }
    }
    Ok(())
}
