//! Import, edit and re-export native Blender scene files from a slicer.
//!
//! The external tool is driven entirely through its headless batch mode; no
//! file-format parsing happens here. A read counts the mesh objects in a
//! file, fans out one export subprocess per object, and imports the
//! resulting interchange files as host scene nodes; a write reassembles the
//! remembered sources of all nodes into one combined native file. Split
//! fragments stay traceable to their original file through the
//! [`ident::SourceMap`] and the `_curasplit_` filename encoding.
//!
//! The host application (scene graph, mesh importers, build volume, user
//! notifications) is reached only through the seams in [`host`].

pub mod config;
pub mod convert;
pub mod count;
pub mod host;
pub mod ident;
pub mod invoker;
pub mod open;
pub mod reader;
pub mod scale;
pub mod script;
pub mod watch;
pub mod writer;

#[cfg(test)]
pub(crate) mod testutil;

pub use blendbridge_error::{BridgeError, Result};

pub use config::{BlenderConfig, InterchangeFormat};
pub use host::{
    BoundingBox, BuildVolume, MeshImporter, Notification, Notifier, OnceNotifier, SceneNode,
};
pub use ident::{SourceMap, SourceReference};
pub use invoker::{BlenderRunner, ConversionJob, ToolRunner};
pub use reader::{BlendReader, ReadOutcome};
pub use watch::{ChangeEvent, ReloadWatcher, WatchOptions};
pub use writer::{BlendWriter, WriteHandle};
