//! Seams toward the host application.
//!
//! The slicer's scene graph, mesh importers, build volume and notification
//! surface are consumed as opaque services. Everything the bridge needs from
//! them is captured in the traits below; the host-integration layer provides
//! the real implementations, tests provide doubles.

use std::cell::Cell;
use std::path::{Path, PathBuf};

use blendbridge_error::Result;

use crate::config::InterchangeFormat;
use crate::scale::ScaleAdvisory;

/// Stable identifier the host assigns to a scene node.
pub type NodeId = u64;

/// Axis-aligned extents of a node or the build volume, in millimeters.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingBox {
    pub width: f64,
    pub depth: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(width: f64, depth: f64, height: f64) -> Self {
        Self {
            width,
            depth,
            height,
        }
    }

    /// The smaller of the two footprint sides.
    pub fn footprint_min(&self) -> f64 {
        self.width.min(self.depth)
    }

    /// The larger of the two footprint sides.
    pub fn footprint_max(&self) -> f64 {
        self.width.max(self.depth)
    }
}

/// One node on the host scene graph.
pub trait SceneNode {
    fn id(&self) -> NodeId;

    /// The source file this node remembers, if any.
    fn source_file_name(&self) -> Option<&Path>;

    /// Overwrites the remembered source file (used to tag split fragments).
    fn set_source_file_name(&mut self, path: PathBuf);

    fn bounding_box(&self) -> BoundingBox;

    /// Applies one uniform scale factor on top of the current scale.
    fn apply_scale(&mut self, factor: f64);

    /// Whether the node carries real mesh data (grouping nodes do not).
    fn has_mesh_data(&self) -> bool;

    fn is_group(&self) -> bool {
        false
    }

    fn children(&self) -> Vec<&dyn SceneNode> {
        Vec::new()
    }
}

/// The host's generic "read a mesh file, get back a node" facility.
pub trait MeshImporter {
    fn import(&self, path: &Path) -> Result<Box<dyn SceneNode>>;
}

/// The printable volume of the active machine.
pub trait BuildVolume {
    fn bounding_box(&self) -> BoundingBox;
}

/// User-facing conditions the bridge surfaces through the host.
///
/// Every terminal read/write condition maps onto exactly one of these; the
/// host renders them as messages with whatever remediation buttons apply.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// The source file contains no mesh objects.
    NoObjects { file: PathBuf },
    /// The expected export file never appeared on disk.
    NoPermission { file: PathBuf },
    /// The importer failed on an existing export; offer alternate formats.
    FormatTooComplex {
        format: InterchangeFormat,
        alternatives: Vec<InterchangeFormat>,
    },
    /// The configured interchange extension is not one of the supported set.
    UnsupportedExtension { extension: String },
    /// The external tool path is unset or failed verification.
    ToolNotConfigured { message: String },
    /// The external tool is older than the minimum supported version.
    OutdatedTool,
    /// A conversion subprocess failed for a reason other than the above.
    ConversionFailed { message: String },
    /// Auto-scaling changed the objects; says which clamp fired.
    Scaled(ScaleAdvisory),
    /// "Open in tool" was requested for nodes from more than one file.
    SelectionSpansFiles,
    /// Other running instances of the tool are about to be terminated.
    ClosingOtherInstances,
}

impl Notification {
    pub fn title(&self) -> &'static str {
        match self {
            Self::NoObjects { .. } => "No object found",
            Self::NoPermission { .. } => "Not enough permission for this path",
            Self::FormatTooComplex { .. } => "File is too complex for this format",
            Self::UnsupportedExtension { .. } => "Unsupported file extension",
            Self::ToolNotConfigured { .. } => "Problem with the Blender path",
            Self::OutdatedTool => "Outdated Blender version",
            Self::ConversionFailed { .. } => "Conversion failed",
            Self::Scaled(ScaleAdvisory::TooSmall) => "Object was too small",
            Self::Scaled(ScaleAdvisory::TooHigh) => "Object was too high",
            Self::Scaled(ScaleAdvisory::TooBroad) => "Objects were too broad",
            Self::SelectionSpansFiles => "Select only objects from the same file",
            Self::ClosingOtherInstances => "Caution!",
        }
    }

    pub fn text(&self) -> String {
        match self {
            Self::NoObjects { file } => {
                format!("{}\ndoes not contain any objects.", file.display())
            }
            Self::NoPermission { file } => format!(
                "Write permission is needed to convert this file.\nPlease move it or grant permission.\n\nPath: {}",
                file.display()
            ),
            Self::FormatTooComplex {
                format,
                alternatives,
            } => {
                let names: Vec<&str> = alternatives.iter().map(|f| f.extension()).collect();
                format!(
                    "This file is too complex for the {} format.\nPlease pick a different one: {}",
                    format.extension(),
                    names.join(", ")
                )
            }
            Self::UnsupportedExtension { extension } => {
                format!("{extension} is not a supported interchange extension.")
            }
            Self::ToolNotConfigured { message } => message.clone(),
            Self::OutdatedTool => "Please update your Blender version.".to_string(),
            Self::ConversionFailed { message } => message.clone(),
            Self::Scaled(ScaleAdvisory::TooSmall) => {
                "Your object was too small and got scaled up to minimum print size.".to_string()
            }
            Self::Scaled(ScaleAdvisory::TooHigh) => {
                "Your object was too high and got scaled down to maximum print size.".to_string()
            }
            Self::Scaled(ScaleAdvisory::TooBroad) => {
                "Your objects were too broad together and got scaled down to maximum print size."
                    .to_string()
            }
            Self::SelectionSpansFiles => {
                "Please rethink your selection.".to_string()
            }
            Self::ClosingOtherInstances => {
                "This will close all other instances of Blender without saving.\nPotential loss of data."
                    .to_string()
            }
        }
    }
}

/// Delivery channel for [`Notification`]s.
pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Wraps a notifier and lets the outdated-tool message through only once.
///
/// Against an outdated installation every read and write fails the same way;
/// the user needs that hint once per session, not once per action.
pub struct OnceNotifier<N: Notifier> {
    inner: N,
    outdated_sent: Cell<bool>,
}

impl<N: Notifier> OnceNotifier<N> {
    pub fn new(inner: N) -> Self {
        Self {
            inner,
            outdated_sent: Cell::new(false),
        }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

impl<N: Notifier> Notifier for OnceNotifier<N> {
    fn notify(&self, notification: Notification) {
        if notification == Notification::OutdatedTool && self.outdated_sent.replace(true) {
            return;
        }
        self.inner.notify(notification);
    }
}

/// A notifier that only logs; useful for headless contexts and tests.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        log::info!("{}: {}", notification.title(), notification.text());
    }
}
