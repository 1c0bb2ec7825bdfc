//! Live-reload file watching.
//!
//! Watches the original native files behind loaded nodes plus any generated
//! foreign sibling scenes, and classifies filesystem noise into the few
//! events the plugin reacts to. The tool's `<name>.blend1` backup siblings
//! are deleted as soon as they appear, from here, so every consumer sees a
//! clean directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use blendbridge_error::{BridgeError, Result, WatchErrorKind};
use crossbeam_channel::{unbounded, Receiver};
use log::{debug, warn};
use notify::{
    Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Result as NotifyResult, Watcher,
};

use crate::ident::{self, SourceReference, NATIVE_EXTENSION};
use crate::open;

/// A classified change on a watched path.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// A loaded source file (or one of its split fragments) was saved.
    SourceChanged {
        path: PathBuf,
        reference: SourceReference,
    },
    /// A generated `_cura_temp` sibling scene was saved; the foreign file
    /// needs a re-export and reload.
    ForeignExportChanged { path: PathBuf },
    /// A `<name>.blend1` backup appeared and was removed.
    BackupDropped { path: PathBuf },
}

#[derive(Clone, Debug)]
pub struct WatchOptions {
    /// Whether saves trigger reload events; when off, changes only re-arm
    /// the watch.
    pub live_reload: bool,
    pub poll_interval_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            live_reload: true,
            poll_interval_ms: 200,
        }
    }
}

fn backup_sibling(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy();
    let dotted = format!(".{NATIVE_EXTENSION}1");
    name.ends_with(dotted.as_str()).then(|| path.to_path_buf())
}

/// Classifies one created/modified path into at most one event.
fn classify(path: &Path, live_reload: bool) -> Option<ChangeEvent> {
    if let Some(backup) = backup_sibling(path) {
        if backup.is_file() {
            if let Err(e) = std::fs::remove_file(&backup) {
                warn!("could not remove {}: {e}", backup.display());
            }
        }
        return Some(ChangeEvent::BackupDropped { path: backup });
    }

    let is_native = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(NATIVE_EXTENSION));
    if !is_native {
        return None;
    }

    if open::is_foreign_scene_path(path) {
        return Some(ChangeEvent::ForeignExportChanged {
            path: path.to_path_buf(),
        });
    }

    if !live_reload {
        debug!("{} changed, live reload is off", path.display());
        return None;
    }
    let reference = match ident::decode(path) {
        Some((original, index)) => SourceReference::split(original, index),
        None => SourceReference::whole(path),
    };
    Some(ChangeEvent::SourceChanged {
        path: path.to_path_buf(),
        reference,
    })
}

/// Channel-based watcher over the plugin's source files.
pub struct ReloadWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<ChangeEvent>,
}

impl ReloadWatcher {
    /// Starts the backend and the classifier thread. Paths are added with
    /// [`watch_path`](Self::watch_path) as files get loaded.
    pub fn spawn(options: WatchOptions) -> Result<Self> {
        let (raw_tx, raw_rx) = unbounded::<Event>();
        let (out_tx, out_rx) = unbounded::<ChangeEvent>();

        let cfg =
            Config::default().with_poll_interval(Duration::from_millis(options.poll_interval_ms));
        let watcher: RecommendedWatcher = Watcher::new(
            move |res: NotifyResult<Event>| match res {
                Ok(event) => {
                    let _ = raw_tx.send(event);
                }
                Err(e) => warn!("notify error: {e}"),
            },
            cfg,
        )
        .map_err(|e| BridgeError::watch(e.to_string(), WatchErrorKind::Init))?;

        std::thread::spawn(move || {
            for event in raw_rx.iter() {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    continue;
                }
                for path in event.paths {
                    if let Some(change) = classify(&path, options.live_reload) {
                        if out_tx.send(change).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(Self {
            watcher,
            receiver: out_rx,
        })
    }

    /// Adds a file (or the directory holding generated siblings) to the watch.
    pub fn watch_path(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| BridgeError::watch(e.to_string(), WatchErrorKind::Notify))
    }

    pub fn unwatch_path(&mut self, path: &Path) -> Result<()> {
        self.watcher
            .unwatch(path)
            .map_err(|e| BridgeError::watch(e.to_string(), WatchErrorKind::Notify))
    }

    /// The classified event stream.
    pub fn events(&self) -> &Receiver<ChangeEvent> {
        &self.receiver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn saved_sources_become_reload_requests() {
        let change = classify(Path::new("/w/model.blend"), true).unwrap();
        assert_eq!(
            change,
            ChangeEvent::SourceChanged {
                path: PathBuf::from("/w/model.blend"),
                reference: SourceReference::whole("/w/model.blend"),
            }
        );
    }

    #[test]
    fn fragment_saves_carry_their_decoded_index() {
        let change = classify(Path::new("/w/model_curasplit_3.blend"), true).unwrap();
        assert_eq!(
            change,
            ChangeEvent::SourceChanged {
                path: PathBuf::from("/w/model_curasplit_3.blend"),
                reference: SourceReference::split("/w/model.blend", 2),
            }
        );
    }

    #[test]
    fn sibling_scenes_are_foreign_export_changes() {
        let change = classify(Path::new("/w/part_cura_temp.blend"), true).unwrap();
        assert_eq!(
            change,
            ChangeEvent::ForeignExportChanged {
                path: PathBuf::from("/w/part_cura_temp.blend"),
            }
        );
    }

    #[test]
    fn live_reload_off_swallows_source_changes_only() {
        assert_eq!(classify(Path::new("/w/model.blend"), false), None);
        // Backups are dropped regardless of the flag.
        assert!(matches!(
            classify(Path::new("/w/model.blend1"), false),
            Some(ChangeEvent::BackupDropped { .. })
        ));
    }

    #[test]
    fn unrelated_files_are_ignored() {
        assert_eq!(classify(Path::new("/w/model.stl"), true), None);
        assert_eq!(classify(Path::new("/w/notes.txt"), true), None);
    }

    #[test]
    fn backups_are_deleted_on_sight() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("model.blend1");
        fs::write(&backup, b"BLENDER").unwrap();

        let change = classify(&backup, true).unwrap();
        assert_eq!(change, ChangeEvent::BackupDropped { path: backup.clone() });
        assert!(!backup.exists());
    }
}
