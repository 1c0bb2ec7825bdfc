//! Reassembling scene nodes back into one native file.
//!
//! Every mesh-bearing leaf node remembers where it came from. Native sources
//! are pre-stripped into `{stem}_curatemp_.blend` copies (one prepare job per
//! distinct original, all concurrent), foreign sources turn into import
//! instructions, one per node, so several nodes sharing one foreign file all
//! reappear; a single final job links everything into the destination file. The final save runs detached, but its outcome is not dropped: the
//! returned [`WriteHandle`] resolves once the tool has exited and the
//! destination actually exists.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use blendbridge_error::{BridgeError, Result, WriteErrorKind};
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::{debug, info, warn};

use crate::config::InterchangeFormat;
use crate::host::SceneNode;
use crate::ident::{SourceMap, SourceReference, NATIVE_EXTENSION};
use crate::invoker::{ConversionJob, LibrarySource, ToolRunner};

/// Suffix of the pre-stripped copy a prepare job produces.
pub const PREPARED_SUFFIX: &str = "_curatemp_";

/// The pre-stripped sibling path for a native original.
pub fn prepared_path(original: &Path) -> PathBuf {
    let s = original.to_string_lossy();
    let dotted = format!(".{NATIVE_EXTENSION}");
    let stem = s.strip_suffix(dotted.as_str()).unwrap_or(&s);
    PathBuf::from(format!("{stem}{PREPARED_SUFFIX}.{NATIVE_EXTENSION}"))
}

/// Everything the final invocation needs, derived from the scene.
#[derive(Debug, PartialEq)]
pub struct WritePlan {
    /// Distinct native originals, each prepared once.
    pub prepares: Vec<(PathBuf, PathBuf)>,
    /// Per-(original, index) extraction entries, pointing at prepared copies.
    pub library_sources: Vec<LibrarySource>,
    /// One import statement per foreign-sourced node.
    pub import_instructions: Vec<String>,
}

/// Derives the write plan from the scene's mesh-bearing leaf nodes.
///
/// Split fragments of the same file collapse into one prepare but keep their
/// individual extraction entries; the native set is ordered so the plan is
/// deterministic regardless of scene traversal order. Foreign paths are NOT
/// deduplicated: a foreign file loaded twice contributes two objects to the
/// scene and must contribute two to the combined file.
pub fn plan_write(nodes: &[&dyn SceneNode], map: &SourceMap) -> Result<WritePlan> {
    let mut leaves: Vec<&dyn SceneNode> = Vec::new();
    for node in nodes {
        collect_leaves(*node, &mut leaves);
    }

    // (original, index) pairs; BTreeSet both dedups and orders.
    let mut native: BTreeSet<(PathBuf, Option<usize>)> = BTreeSet::new();
    let mut foreign: Vec<PathBuf> = Vec::new();
    for leaf in leaves {
        let Some(recorded) = leaf.source_file_name() else {
            continue;
        };
        let extension = recorded
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if extension == NATIVE_EXTENSION {
            let SourceReference {
                original_path,
                split_index,
            } = map.resolve(leaf.id(), recorded);
            native.insert((original_path, split_index));
        } else {
            foreign.push(recorded.to_path_buf());
        }
    }

    if native.is_empty() && foreign.is_empty() {
        return Err(BridgeError::write(
            "no node on the scene remembers a source file",
            WriteErrorKind::NothingToWrite,
        ));
    }

    let originals: BTreeSet<&PathBuf> = native.iter().map(|(original, _)| original).collect();
    let prepares: Vec<(PathBuf, PathBuf)> = originals
        .into_iter()
        .map(|original| (original.clone(), prepared_path(original)))
        .collect();

    let library_sources = native
        .iter()
        .map(|(original, index)| LibrarySource {
            path: prepared_path(original),
            object_index: *index,
        })
        .collect();

    let mut import_instructions = Vec::with_capacity(foreign.len());
    for file in &foreign {
        let extension = file
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let format = InterchangeFormat::from_extension(&extension).ok_or_else(|| {
            BridgeError::config_unsupported_extension(extension).with_file_path(file)
        })?;
        import_instructions.push(format.import_instruction(file));
    }

    Ok(WritePlan {
        prepares,
        library_sources,
        import_instructions,
    })
}

fn collect_leaves<'n>(node: &'n dyn SceneNode, out: &mut Vec<&'n dyn SceneNode>) {
    if node.is_group() {
        for child in node.children() {
            collect_leaves(child, out);
        }
    } else if node.has_mesh_data() {
        out.push(node);
    }
}

/// Resolves once the detached save has finished.
pub struct WriteHandle {
    receiver: Receiver<Result<()>>,
}

impl WriteHandle {
    /// Blocks until the save finished.
    pub fn wait(self) -> Result<()> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(BridgeError::write(
                "the write worker vanished without reporting",
                WriteErrorKind::ToolFailed,
            )))
    }

    /// Non-blocking poll; `None` while the save is still running.
    pub fn try_wait(&self) -> Option<Result<()>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(BridgeError::write(
                "the write worker vanished without reporting",
                WriteErrorKind::ToolFailed,
            ))),
        }
    }
}

/// Drives one reassembly into a destination file.
pub struct BlendWriter<'a> {
    runner: &'a dyn ToolRunner,
}

impl<'a> BlendWriter<'a> {
    pub fn new(runner: &'a dyn ToolRunner) -> Self {
        Self { runner }
    }

    /// Prepares all native sources, then kicks off the final save.
    ///
    /// The prepare jobs run concurrently and are all joined before the final
    /// job starts, because it loads their output as libraries.
    pub fn write(
        &self,
        destination: &Path,
        nodes: &[&dyn SceneNode],
        map: &SourceMap,
    ) -> Result<WriteHandle> {
        let plan = plan_write(nodes, map)?;
        debug!(
            "writing {} ({} native source(s), {} foreign file(s))",
            destination.display(),
            plan.library_sources.len(),
            plan.import_instructions.len()
        );

        let mut children = Vec::with_capacity(plan.prepares.len());
        for (original, prepared) in &plan.prepares {
            let job = ConversionJob::write_prepare(original, prepared);
            children.push((original.clone(), self.runner.spawn(&job)?));
        }
        for (original, mut child) in children {
            if !child.wait()? {
                return Err(BridgeError::write(
                    format!("preparing {} failed", original.display()),
                    WriteErrorKind::ToolFailed,
                )
                .with_file_path(destination));
            }
        }

        let job = ConversionJob::write(
            destination,
            plan.import_instructions,
            plan.library_sources,
        );
        let mut child = self
            .runner
            .spawn(&job)
            .map_err(|e| BridgeError::write(e.user_message(), WriteErrorKind::LaunchFailed))?;

        let destination = destination.to_path_buf();
        let prepared: Vec<PathBuf> = plan.prepares.into_iter().map(|(_, p)| p).collect();
        let (sender, receiver) = bounded(1);
        std::thread::spawn(move || {
            let result = finish_write(child.as_mut(), &destination, &prepared);
            // A dropped handle means nobody is waiting for the outcome.
            let _ = sender.send(result);
        });
        Ok(WriteHandle { receiver })
    }
}

/// Waits out the final save and confirms its effects on disk.
fn finish_write(
    child: &mut dyn crate::invoker::ToolChild,
    destination: &Path,
    prepared: &[PathBuf],
) -> Result<()> {
    let success = child.wait();

    // Prepared copies are consumed by the save; sweep up whatever is left,
    // also on the failure paths.
    for path in prepared {
        if path.is_file() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("could not remove {}: {e}", path.display());
            }
        }
    }

    if !success? {
        return Err(BridgeError::write(
            "the save subprocess exited with failure",
            WriteErrorKind::ToolFailed,
        )
        .with_file_path(destination));
    }
    if !destination.is_file() {
        return Err(
            BridgeError::write_destination_missing("the tool reported success")
                .with_file_path(destination),
        );
    }

    // Saving over an existing file leaves a `<name>1` backup sibling behind.
    let mut backup = OsString::from(destination.as_os_str());
    backup.push("1");
    let backup = PathBuf::from(backup);
    if backup.is_file() {
        if let Err(e) = std::fs::remove_file(&backup) {
            warn!("could not remove {}: {e}", backup.display());
        }
    }

    info!("wrote {}", destination.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BoundingBox;
    use crate::ident;
    use crate::testutil::{FakeTool, TestNode};
    use blendbridge_error::WriteErrorKind;
    use std::fs;

    fn node_with_source(path: &Path) -> TestNode {
        let mut node = TestNode::new(BoundingBox::new(10.0, 10.0, 10.0));
        node.set_source_file_name(path.to_path_buf());
        node
    }

    #[test]
    fn fragments_of_one_file_share_a_single_prepare() {
        let original = PathBuf::from("/w/many.blend");
        let a = node_with_source(&ident::encode(&original, 0));
        let b = node_with_source(&ident::encode(&original, 2));
        let nodes: Vec<&dyn SceneNode> = vec![&a, &b];

        let plan = plan_write(&nodes, &SourceMap::new()).unwrap();
        assert_eq!(
            plan.prepares,
            vec![(original.clone(), PathBuf::from("/w/many_curatemp_.blend"))]
        );
        assert_eq!(
            plan.library_sources,
            vec![
                LibrarySource {
                    path: PathBuf::from("/w/many_curatemp_.blend"),
                    object_index: Some(0),
                },
                LibrarySource {
                    path: PathBuf::from("/w/many_curatemp_.blend"),
                    object_index: Some(2),
                },
            ]
        );
        assert!(plan.import_instructions.is_empty());
    }

    #[test]
    fn identity_map_overrides_the_recorded_filename() {
        let recorded = PathBuf::from("/w/renamed.blend");
        let node = node_with_source(&recorded);
        let mut map = SourceMap::new();
        map.insert(node.id(), SourceReference::split("/w/real.blend", 4));
        let nodes: Vec<&dyn SceneNode> = vec![&node];

        let plan = plan_write(&nodes, &map).unwrap();
        assert_eq!(plan.prepares[0].0, PathBuf::from("/w/real.blend"));
        assert_eq!(plan.library_sources[0].object_index, Some(4));
    }

    #[test]
    fn foreign_files_become_import_instructions() {
        let a = node_with_source(Path::new("/w/part.stl"));
        let b = node_with_source(Path::new("/w/other.obj"));
        let nodes: Vec<&dyn SceneNode> = vec![&a, &b];

        let plan = plan_write(&nodes, &SourceMap::new()).unwrap();
        assert!(plan.prepares.is_empty());
        assert_eq!(plan.import_instructions.len(), 2);
        assert!(plan.import_instructions.iter().any(|i| i.contains("obj")));
        assert!(plan.import_instructions.iter().any(|i| i.contains("stl")));
    }

    #[test]
    fn nodes_sharing_a_foreign_file_each_get_an_import() {
        let a = node_with_source(Path::new("/w/part.stl"));
        let b = node_with_source(Path::new("/w/part.stl"));
        let nodes: Vec<&dyn SceneNode> = vec![&a, &b];

        let plan = plan_write(&nodes, &SourceMap::new()).unwrap();
        assert_eq!(plan.import_instructions.len(), 2);
        assert_eq!(plan.import_instructions[0], plan.import_instructions[1]);
    }

    #[test]
    fn sourceless_scene_is_nothing_to_write() {
        let node = TestNode::new(BoundingBox::new(10.0, 10.0, 10.0));
        let nodes: Vec<&dyn SceneNode> = vec![&node];
        let err = plan_write(&nodes, &SourceMap::new()).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Write {
                kind: WriteErrorKind::NothingToWrite,
                ..
            }
        ));
    }

    #[test]
    fn write_confirms_the_destination_and_sweeps_the_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("many.blend");
        fs::write(&original, b"BLENDER").unwrap();
        let destination = dir.path().join("out.blend");

        // A stale backup from an earlier save.
        let backup = dir.path().join("out.blend1");
        fs::write(&backup, b"BLENDER").unwrap();

        let a = node_with_source(&ident::encode(&original, 0));
        let b = node_with_source(&ident::encode(&original, 1));
        let nodes: Vec<&dyn SceneNode> = vec![&a, &b];

        let tool = FakeTool::with_count(2);
        let writer = BlendWriter::new(&tool);
        let handle = writer.write(&destination, &nodes, &SourceMap::new()).unwrap();
        handle.wait().unwrap();

        assert!(destination.is_file());
        assert!(!backup.exists());
        assert!(!prepared_path(&original).exists());
    }

    #[test]
    fn missing_destination_is_reported_through_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("one.blend");
        fs::write(&original, b"BLENDER").unwrap();
        let destination = dir.path().join("out.blend");

        let node = node_with_source(&original);
        let nodes: Vec<&dyn SceneNode> = vec![&node];

        let tool = FakeTool {
            count: 1,
            create_files: false,
        };
        let writer = BlendWriter::new(&tool);
        let handle = writer.write(&destination, &nodes, &SourceMap::new()).unwrap();
        let err = handle.wait().unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Write {
                kind: WriteErrorKind::DestinationMissing,
                ..
            }
        ));
    }
}
