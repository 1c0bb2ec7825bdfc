//! Opening a node's source in the external tool, interactively.
//!
//! Native sources open directly (split fragments open their whole original
//! file). Foreign interchange files cannot be opened as scenes, so they are
//! first round-tripped into a `{stem}_cura_temp.blend` sibling scene; edits
//! to that scene flow back through [`reexport_foreign`].

use std::path::{Path, PathBuf};

use blendbridge_error::{BridgeError, CliErrorKind, Result};
use log::{info, warn};

use crate::config::{BlenderConfig, InterchangeFormat};
use crate::host::{Notification, Notifier, SceneNode};
use crate::ident::{SourceMap, NATIVE_EXTENSION};
use crate::invoker::BlenderRunner;

/// Suffix of the editable scene generated for a foreign file.
pub const FOREIGN_SCENE_SUFFIX: &str = "_cura_temp";

/// The sibling scene path for a foreign file.
pub fn foreign_scene_path(foreign: &Path) -> PathBuf {
    let dir = foreign.parent().unwrap_or_else(|| Path::new("."));
    let stem = foreign
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    dir.join(format!("{stem}{FOREIGN_SCENE_SUFFIX}.{NATIVE_EXTENSION}"))
}

/// Whether a path is such a generated sibling scene.
pub fn is_foreign_scene_path(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == NATIVE_EXTENSION)
        && path
            .file_stem()
            .is_some_and(|s| s.to_string_lossy().ends_with(FOREIGN_SCENE_SUFFIX))
}

/// What an "open in tool" request resolved to.
#[derive(Debug, PartialEq, Eq)]
pub enum OpenTarget {
    /// A native file, openable as-is.
    Native(PathBuf),
    /// A foreign file that needs a generated sibling scene first.
    Foreign(PathBuf),
}

/// Resolves a selection of nodes to the one file to open.
///
/// Split fragments resolve to their whole original, so selecting several
/// fragments of the same file is fine; a selection spanning distinct files
/// is refused because only one tool window is opened.
pub fn resolve_open_target(nodes: &[&dyn SceneNode], map: &SourceMap) -> Result<OpenTarget> {
    let mut files: Vec<PathBuf> = Vec::new();
    for node in nodes {
        let Some(recorded) = node.source_file_name() else {
            continue;
        };
        let is_native = recorded
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(NATIVE_EXTENSION));
        let file = if is_native {
            map.resolve(node.id(), recorded).original_path
        } else {
            recorded.to_path_buf()
        };
        if !files.contains(&file) {
            files.push(file);
        }
    }

    match files.len() {
        0 => Err(BridgeError::cli(
            "the selection contains no node with a source file",
            CliErrorKind::MissingArgument,
        )),
        1 => {
            let file = files.pop().unwrap_or_default();
            let is_native = file
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(NATIVE_EXTENSION));
            if is_native {
                Ok(OpenTarget::Native(file))
            } else {
                Ok(OpenTarget::Foreign(file))
            }
        }
        _ => Err(BridgeError::cli(
            "the selection spans more than one source file",
            CliErrorKind::InvalidArguments,
        )),
    }
}

/// Opens resolved targets in the external tool.
pub struct ToolLauncher<'a> {
    config: &'a BlenderConfig,
    runner: &'a BlenderRunner,
    notifier: &'a dyn Notifier,
}

impl<'a> ToolLauncher<'a> {
    pub fn new(
        config: &'a BlenderConfig,
        runner: &'a BlenderRunner,
        notifier: &'a dyn Notifier,
    ) -> Self {
        Self {
            config,
            runner,
            notifier,
        }
    }

    /// Opens the target interactively and returns the path that was opened.
    ///
    /// For a foreign target the returned path is the generated sibling scene;
    /// the caller registers it with the foreign-file watcher so edits flow
    /// back.
    pub fn open(&self, target: &OpenTarget) -> Result<PathBuf> {
        match target {
            OpenTarget::Native(file) => {
                self.runner.open_interactive(file)?;
                Ok(file.clone())
            }
            OpenTarget::Foreign(file) => {
                let scene = self.build_foreign_scene(file)?;
                self.runner.open_interactive(&scene)?;
                Ok(scene)
            }
        }
    }

    /// Imports a foreign file into a fresh scene and saves it as the sibling
    /// `_cura_temp` file.
    fn build_foreign_scene(&self, foreign: &Path) -> Result<PathBuf> {
        let extension = foreign
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let format = InterchangeFormat::from_extension(&extension).ok_or_else(|| {
            BridgeError::config_unsupported_extension(extension).with_file_path(foreign)
        })?;

        let scene = foreign_scene_path(foreign);
        let expr = format!(
            "import bpy; bpy.data.objects.remove(bpy.data.objects['Cube']); {}; \
             bpy.ops.wm.save_as_mainfile(filepath = '{}')",
            format.import_instruction(foreign),
            scene.display().to_string().replace('\\', "/"),
        );
        let output = self.runner.run_expr(None, &expr)?;
        if !output.success || !scene.is_file() {
            return Err(
                BridgeError::convert_tool_failed("building the editable scene failed")
                    .with_file_path(foreign),
            );
        }
        info!("built editable scene {}", scene.display());
        Ok(scene)
    }

    /// Terminates every other running instance of the tool.
    ///
    /// Instances hold locks on their open files; a warning goes out first
    /// because unsaved work in them is lost.
    pub fn close_other_instances(&self) -> Result<()> {
        if self.config.warn_before_closing_instances {
            self.notifier.notify(Notification::ClosingOtherInstances);
        }
        let name = self
            .runner
            .tool_path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let status = if cfg!(target_os = "windows") {
            std::process::Command::new("taskkill")
                .args(["/f", "/im", &name])
                .status()
        } else {
            std::process::Command::new("pkill").args(["-f", &name]).status()
        };
        if let Err(e) = status {
            warn!("closing other instances failed: {e}");
        }
        Ok(())
    }
}

/// Re-exports an edited sibling scene back to its foreign format.
///
/// Returns the refreshed foreign-format export, which the caller reads and
/// then removes; the original foreign file itself is never overwritten.
pub fn reexport_foreign(
    runner: &BlenderRunner,
    scene: &Path,
    format: InterchangeFormat,
) -> Result<PathBuf> {
    let export = scene.with_extension(format.extension());
    let expr = format!("import bpy; {}", format.export_instruction(&export));
    let output = runner.run_expr(Some(scene), &expr)?;
    if !output.success || !export.is_file() {
        return Err(
            BridgeError::convert_tool_failed("re-exporting the edited scene failed")
                .with_file_path(scene),
        );
    }
    Ok(export)
}
