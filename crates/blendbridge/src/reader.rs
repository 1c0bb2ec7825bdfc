//! The read entry point: native file in, host scene nodes out.
//!
//! A read branches on the object count of the file (empty, single, split) or,
//! when the requested path itself carries the split marker, turns into a
//! reload of exactly one fragment. After conversion the nodes run through the
//! scale normalizer, and the identity map is updated so later writes and
//! reloads can trace every node back to its source. The caller is expected to
//! register the *original* file with the watcher, never the converted temp
//! path.

use std::path::{Path, PathBuf};

use blendbridge_error::{BridgeError, ConfigErrorKind, Result};
use log::{debug, info};

use crate::config::{BlenderConfig, InterchangeFormat};
use crate::convert::Converter;
use crate::count::count_mesh_objects;
use crate::host::{BuildVolume, MeshImporter, Notification, Notifier, SceneNode};
use crate::ident::{self, SourceMap, SourceReference};
use crate::invoker::ToolRunner;
use crate::scale::{self, ScaleOutcome};

/// What a read produced.
pub struct ReadOutcome {
    pub nodes: Vec<Box<dyn SceneNode>>,
    /// The applied scale, when auto-scaling ran.
    pub scale: Option<ScaleOutcome>,
    /// Whether this read replaced already-loaded nodes.
    pub reload: bool,
}

/// Reads native scene files through the external tool.
pub struct BlendReader<'a> {
    config: &'a BlenderConfig,
    runner: &'a dyn ToolRunner,
    importer: &'a dyn MeshImporter,
    notifier: &'a dyn Notifier,
    volume: &'a dyn BuildVolume,
}

impl<'a> BlendReader<'a> {
    pub fn new(
        config: &'a BlenderConfig,
        runner: &'a dyn ToolRunner,
        importer: &'a dyn MeshImporter,
        notifier: &'a dyn Notifier,
        volume: &'a dyn BuildVolume,
    ) -> Self {
        Self {
            config,
            runner,
            importer,
            notifier,
            volume,
        }
    }

    /// Reads `file`, records every produced node in `map`.
    ///
    /// `existing_sources` lists the source files already present on the
    /// scene; a read of a file that is already loaded counts as a reload and
    /// repeats no scale message. An empty file is not an error: it notifies
    /// and yields an empty outcome.
    pub fn read(
        &self,
        file: &Path,
        map: &mut SourceMap,
        existing_sources: &[PathBuf],
    ) -> Result<ReadOutcome> {
        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if extension != ident::NATIVE_EXTENSION {
            return Err(BridgeError::config(
                format!("cannot read '.{extension}' files"),
                ConfigErrorKind::UnsupportedExtension,
            )
            .with_file_path(file));
        }

        let converter = Converter::new(self.runner, self.importer, self.config.interchange);

        // A split-fragment path means one object of an already-split file
        // changed on disk; only that fragment is converted again.
        if let Some((original, index)) = ident::decode(file) {
            debug!(
                "reloading object {} of {}",
                index + 1,
                original.display()
            );
            let node = converter.convert_indexed(&original, index)?;
            map.insert(node.id(), SourceReference::split(&original, index));
            let mut nodes = vec![node];
            let scale = self.normalize(&mut nodes, true);
            return Ok(ReadOutcome {
                nodes,
                scale,
                reload: true,
            });
        }

        let reload = existing_sources.iter().any(|source| {
            source == file
                || ident::decode(source).is_some_and(|(original, _)| original == *file)
        });

        let count = count_mesh_objects(self.runner, file)?;
        let mut nodes: Vec<Box<dyn SceneNode>> = match count {
            0 => {
                self.notifier.notify(Notification::NoObjects {
                    file: file.to_path_buf(),
                });
                return Ok(ReadOutcome {
                    nodes: Vec::new(),
                    scale: None,
                    reload,
                });
            }
            1 => {
                let node = converter.convert_single(file)?;
                map.insert(node.id(), SourceReference::whole(file));
                vec![node]
            }
            count => {
                let nodes = converter.convert_split(file, count)?;
                for (index, node) in nodes.iter().enumerate() {
                    map.insert(node.id(), SourceReference::split(file, index));
                }
                nodes
            }
        };

        let scale = self.normalize(&mut nodes, reload);
        info!("read {} node(s) from {}", nodes.len(), file.display());
        Ok(ReadOutcome {
            nodes,
            scale,
            reload,
        })
    }

    /// Like [`read`](Self::read), but maps a terminal error onto its user
    /// notification before propagating it, so callers at the host boundary
    /// do not have to repeat the mapping.
    pub fn read_reported(
        &self,
        file: &Path,
        map: &mut SourceMap,
        existing_sources: &[PathBuf],
    ) -> Result<ReadOutcome> {
        self.read(file, map, existing_sources).map_err(|e| {
            self.notifier
                .notify(notification_for(&e, self.config.interchange));
            e
        })
    }

    /// Runs the scale normalizer over freshly converted nodes. The factor is
    /// always applied; the advisory message is dropped on reloads so a user
    /// editing a file is not nagged on every save.
    fn normalize(
        &self,
        nodes: &mut [Box<dyn SceneNode>],
        reload: bool,
    ) -> Option<ScaleOutcome> {
        if !self.config.auto_scale_on_read {
            return None;
        }
        let boxes: Vec<_> = nodes.iter().map(|n| n.bounding_box()).collect();
        let outcome = scale::normalize(&boxes, self.volume.bounding_box());
        if !outcome.is_noop() {
            for node in nodes.iter_mut() {
                node.apply_scale(outcome.factor);
            }
        }
        if let Some(advisory) = outcome.advisory {
            if self.config.show_scale_message && !reload {
                self.notifier.notify(Notification::Scaled(advisory));
            }
        }
        Some(outcome)
    }
}

/// Maps a terminal read error onto the notification the host should show.
pub fn notification_for(err: &BridgeError, format: InterchangeFormat) -> Notification {
    match err {
        BridgeError::Config {
            kind: ConfigErrorKind::OutdatedToolVersion,
            ..
        } => Notification::OutdatedTool,
        BridgeError::Config {
            kind: ConfigErrorKind::UnsupportedExtension,
            message,
            ..
        } => Notification::UnsupportedExtension {
            extension: message.clone(),
        },
        BridgeError::Config { .. } => Notification::ToolNotConfigured {
            message: err.user_message(),
        },
        BridgeError::Convert { kind, file_path, .. } => {
            use blendbridge_error::ConvertErrorKind::*;
            match kind {
                NoObjects => Notification::NoObjects {
                    file: file_path.clone().unwrap_or_default(),
                },
                PermissionDenied => Notification::NoPermission {
                    file: file_path.clone().unwrap_or_default(),
                },
                FormatTooComplex => Notification::FormatTooComplex {
                    format,
                    alternatives: format.alternatives(),
                },
                _ => Notification::ConversionFailed {
                    message: err.user_message(),
                },
            }
        }
        _ => Notification::ConversionFailed {
            message: err.user_message(),
        },
    }
}
