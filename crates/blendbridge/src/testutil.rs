//! Shared doubles for the unit tests of this crate.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use blendbridge_error::{BridgeError, Result};

use crate::host::{
    BoundingBox, BuildVolume, MeshImporter, NodeId, Notification, Notifier, SceneNode,
};
use crate::invoker::{ConversionJob, JobPayload, ToolChild, ToolOutput, ToolRunner};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) struct TestNode {
    id: NodeId,
    source: Option<PathBuf>,
    bbox: BoundingBox,
}

impl TestNode {
    pub(crate) fn new(bbox: BoundingBox) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            source: None,
            bbox,
        }
    }
}

impl SceneNode for TestNode {
    fn id(&self) -> NodeId {
        self.id
    }
    fn source_file_name(&self) -> Option<&Path> {
        self.source.as_deref()
    }
    fn set_source_file_name(&mut self, path: PathBuf) {
        self.source = Some(path);
    }
    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
    fn apply_scale(&mut self, factor: f64) {
        self.bbox = BoundingBox::new(
            self.bbox.width * factor,
            self.bbox.depth * factor,
            self.bbox.height * factor,
        );
    }
    fn has_mesh_data(&self) -> bool {
        true
    }
}

/// Importer double; every import yields a node of the configured size.
pub(crate) struct TestImporter {
    pub fail: bool,
    pub bbox: BoundingBox,
}

impl TestImporter {
    pub(crate) fn new() -> Self {
        Self {
            fail: false,
            bbox: BoundingBox::new(10.0, 10.0, 10.0),
        }
    }
}

impl MeshImporter for TestImporter {
    fn import(&self, path: &Path) -> Result<Box<dyn SceneNode>> {
        if self.fail {
            return Err(BridgeError::io_with_path("importer exploded", path));
        }
        let mut node = TestNode::new(self.bbox);
        node.set_source_file_name(path.to_path_buf());
        Ok(Box::new(node))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub seen: RefCell<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.borrow_mut().push(notification);
    }
}

pub(crate) struct FixedVolume(pub BoundingBox);

impl BuildVolume for FixedVolume {
    fn bounding_box(&self) -> BoundingBox {
        self.0
    }
}

/// Pulls the filepath argument out of an export/import instruction.
pub(crate) fn instruction_path(instruction: &str) -> PathBuf {
    let start = instruction.find('\'').unwrap() + 1;
    let end = instruction.rfind('\'').unwrap();
    PathBuf::from(&instruction[start..end])
}

/// Tool double that produces the files the real tool would, without any
/// subprocess. Spawned jobs write their output on `wait`, not on spawn, so
/// join-order bookkeeping gets exercised.
pub(crate) struct FakeTool {
    pub count: usize,
    pub create_files: bool,
}

impl FakeTool {
    pub(crate) fn with_count(count: usize) -> Self {
        Self {
            count,
            create_files: true,
        }
    }

    fn output_path(&self, payload: &JobPayload) -> Option<PathBuf> {
        match payload {
            JobPayload::ExportSingle { export_instruction }
            | JobPayload::ExportIndexed {
                export_instruction, ..
            } => Some(instruction_path(export_instruction)),
            JobPayload::WritePrepare { destination } | JobPayload::Write { destination, .. } => {
                Some(destination.clone())
            }
            JobPayload::CountMeshes => None,
        }
    }
}

impl ToolRunner for FakeTool {
    fn run(&self, job: &ConversionJob) -> Result<ToolOutput> {
        let stdout = match &job.payload {
            JobPayload::CountMeshes => format!("Blender quit\n{}\n", self.count),
            other => {
                if self.create_files {
                    if let Some(path) = self.output_path(other) {
                        fs::write(path, b"fake tool output\n")?;
                    }
                }
                String::new()
            }
        };
        Ok(ToolOutput {
            success: true,
            stdout,
        })
    }

    fn spawn(&self, job: &ConversionJob) -> Result<Box<dyn ToolChild>> {
        let path = self
            .create_files
            .then(|| self.output_path(&job.payload))
            .flatten();
        Ok(Box::new(FakeChild { path }))
    }
}

pub(crate) struct FakeChild {
    pub path: Option<PathBuf>,
}

impl ToolChild for FakeChild {
    fn wait(&mut self) -> Result<bool> {
        if let Some(path) = &self.path {
            fs::write(path, b"fake tool output\n")?;
        }
        Ok(true)
    }
}

/// A runner that must never be reached.
pub(crate) struct PanicRunner;

impl ToolRunner for PanicRunner {
    fn run(&self, job: &ConversionJob) -> Result<ToolOutput> {
        panic!("unexpected tool invocation: {:?}", job.payload);
    }
    fn spawn(&self, job: &ConversionJob) -> Result<Box<dyn ToolChild>> {
        panic!("unexpected tool spawn: {:?}", job.payload);
    }
}
