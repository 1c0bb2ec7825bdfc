//! Host-seam implementations for a headless command line run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use blendbridge::host::NodeId;
use blendbridge::invoker::BlenderRunner;
use blendbridge::{
    BlenderConfig, BoundingBox, BuildVolume, MeshImporter, Notification, Notifier, SceneNode,
};
use blendbridge_error::Result;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A scene node that only remembers where it came from. The command line has
/// no real scene graph, so geometry stays with the files on disk.
pub struct FileNode {
    id: NodeId,
    source: Option<PathBuf>,
}

impl FileNode {
    pub fn new(source: &Path) -> Self {
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            source: Some(source.to_path_buf()),
        }
    }
}

impl SceneNode for FileNode {
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
        BoundingBox::default()
    }
    fn apply_scale(&mut self, _factor: f64) {}
    fn has_mesh_data(&self) -> bool {
        true
    }
}

/// Importer double: accepts the converted interchange file without parsing it.
pub struct FileImporter;

impl MeshImporter for FileImporter {
    fn import(&self, path: &Path) -> Result<Box<dyn SceneNode>> {
        Ok(Box::new(FileNode::new(path)))
    }
}

/// Prints notifications the way the host would show them.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        println!("{}: {}", notification.title(), notification.text());
    }
}

/// A conventional 200 mm cube stands in for the machine volume.
pub struct DefaultVolume;

impl BuildVolume for DefaultVolume {
    fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(200.0, 200.0, 200.0)
    }
}

/// Loads settings and applies the per-invocation tool override.
pub fn load_config(settings: &Path, tool: Option<&Path>) -> Result<BlenderConfig> {
    let mut config = BlenderConfig::load(settings)?;
    if let Some(tool) = tool {
        config.tool_path = Some(tool.to_path_buf());
        config.invalidate_verification();
    }
    Ok(config)
}

/// Verifies the tool and hands back a ready runner.
pub fn verified_runner(config: &mut BlenderConfig) -> Result<BlenderRunner> {
    if config.tool_path.is_none() {
        config.tool_path = BlenderConfig::detect_tool_path();
    }
    config.verify()?;
    BlenderRunner::from_config(config)
}
