//! Plugin configuration and external-tool verification.
//!
//! Earlier revisions of this plugin kept the tool path and verification flags
//! as process-wide globals; here they live on an explicit [`BlenderConfig`]
//! that is passed into each component.

use std::fs;
use std::path::{Path, PathBuf};

use blendbridge_error::{BridgeError, ConfigErrorKind, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Expression run inside the tool to check the minimum supported version.
pub const VERSION_PROBE_EXPR: &str = "import bpy; print(bpy.app.version >= (2, 80, 0))";

/// Mesh interchange formats the host importer can read.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterchangeFormat {
    Stl,
    Obj,
    X3d,
    Ply,
}

impl InterchangeFormat {
    pub const ALL: [InterchangeFormat; 4] = [Self::Stl, Self::Obj, Self::X3d, Self::Ply];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Stl => "stl",
            Self::Obj => "obj",
            Self::X3d => "x3d",
            Self::Ply => "ply",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "stl" => Some(Self::Stl),
            "obj" => Some(Self::Obj),
            "x3d" => Some(Self::X3d),
            "ply" => Some(Self::Ply),
            _ => None,
        }
    }

    /// stl/ply go through the mesh exporter, obj/x3d through the scene exporter.
    fn uses_scene_operator(&self) -> bool {
        matches!(self, Self::Obj | Self::X3d)
    }

    /// Exporting obj leaves a material-library sidecar next to the file.
    pub fn has_material_sidecar(&self) -> bool {
        matches!(self, Self::Obj)
    }

    /// The export statement executed inside the tool for this format.
    pub fn export_instruction(&self, path: &Path) -> String {
        let operator = if self.uses_scene_operator() {
            "export_scene"
        } else {
            "export_mesh"
        };
        format!(
            "bpy.ops.{}.{}(filepath = '{}', check_existing = False)",
            operator,
            self.extension(),
            py_path(path)
        )
    }

    /// The import statement executed inside the tool for this format.
    pub fn import_instruction(&self, path: &Path) -> String {
        let operator = if self.uses_scene_operator() {
            "import_scene"
        } else {
            "import_mesh"
        };
        format!(
            "bpy.ops.{}.{}(filepath = '{}')",
            operator,
            self.extension(),
            py_path(path)
        )
    }

    /// The other formats, offered as remediation when this one fails.
    pub fn alternatives(&self) -> Vec<InterchangeFormat> {
        Self::ALL.iter().copied().filter(|f| f != self).collect()
    }
}

/// Renders a path into a single-quoted Python string literal body.
fn py_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace('\'', "\\'")
}

/// All settings of the plugin plus the tool verification state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct BlenderConfig {
    /// Path to the external tool executable.
    pub tool_path: Option<PathBuf>,
    /// Interchange format used for all conversions.
    pub interchange: InterchangeFormat,
    /// Reload nodes automatically when their source file changes.
    pub live_reload: bool,
    /// Re-arrange the build plate after a reload.
    pub auto_arrange_on_reload: bool,
    /// Fit freshly read objects into the build volume.
    pub auto_scale_on_read: bool,
    /// Show a message when auto-scaling changed the objects.
    pub show_scale_message: bool,
    /// Warn before terminating other running tool instances.
    pub warn_before_closing_instances: bool,

    #[serde(skip)]
    verified: bool,
    #[serde(skip)]
    outdated: bool,
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            tool_path: None,
            interchange: InterchangeFormat::Stl,
            live_reload: true,
            auto_arrange_on_reload: true,
            auto_scale_on_read: true,
            show_scale_message: true,
            warn_before_closing_instances: true,
            verified: false,
            outdated: false,
        }
    }
}

impl BlenderConfig {
    /// Loads settings from a JSON file, falling back to defaults when absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("no settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .map_err(|e| BridgeError::config(e.to_string(), ConfigErrorKind::SettingsUnreadable))?;
        serde_json::from_str(&data)
            .map_err(|e| BridgeError::config(e.to_string(), ConfigErrorKind::SettingsUnreadable))
    }

    /// Persists settings as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| BridgeError::config(e.to_string(), ConfigErrorKind::InvalidValue))?;
        fs::write(path, data).map_err(|e| BridgeError::from(e).with_file_path(path))?;
        Ok(())
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_outdated(&self) -> bool {
        self.outdated
    }

    /// Forgets a previous verification, e.g. after the path changed.
    pub fn invalidate_verification(&mut self) {
        self.verified = false;
        self.outdated = false;
    }

    /// Returns the verified tool path, or the configuration error that
    /// explains why no subprocess may be spawned.
    pub fn require_verified(&self) -> Result<&Path> {
        let path = self.tool_path.as_deref().ok_or_else(|| {
            BridgeError::config_tool_unset("no path to the external tool is configured")
        })?;
        if self.outdated {
            return Err(BridgeError::config_tool_outdated(
                "the configured tool version is older than the supported minimum",
            )
            .with_file_path(path));
        }
        if !self.verified {
            return Err(BridgeError::config_tool_unverified(
                "the configured tool path has not been verified",
            )
            .with_file_path(path));
        }
        Ok(path)
    }

    /// Verifies the configured tool path with the given probe, which runs the
    /// tool headless with [`VERSION_PROBE_EXPR`] and returns captured stdout.
    ///
    /// Returns `Ok(true)` once verified. `Ok(false)` means the probe ran but
    /// reported an outdated version.
    pub fn verify_with<F>(&mut self, probe: F) -> Result<bool>
    where
        F: FnOnce(&Path) -> Result<String>,
    {
        if self.verified {
            return Ok(true);
        }
        let path = self.tool_path.clone().ok_or_else(|| {
            BridgeError::config_tool_unset("no path to the external tool is configured")
        })?;
        if !path.exists() {
            return Err(BridgeError::config_tool_unverified(
                "the configured tool path does not exist",
            )
            .with_file_path(path));
        }

        let stdout = probe(&path)?;
        for line in stdout.lines() {
            match line.trim() {
                "True" => {
                    self.verified = true;
                    self.outdated = false;
                    debug!("verified tool at {}", path.display());
                    return Ok(true);
                }
                "False" => {
                    self.outdated = true;
                    warn!("tool at {} is outdated", path.display());
                    return Ok(false);
                }
                _ => {}
            }
        }
        Err(
            BridgeError::config_tool_unverified("the probe output did not identify the tool")
                .with_file_path(path),
        )
    }

    /// Verifies by actually spawning the configured tool.
    pub fn verify(&mut self) -> Result<bool> {
        self.verify_with(|path| {
            let output = std::process::Command::new(path)
                .arg("--background")
                .arg("--python-expr")
                .arg(VERSION_PROBE_EXPR)
                .output()
                .map_err(|e| BridgeError::from(e).with_file_path(path))?;
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        })
    }

    /// Tries the conventional install locations for the current platform.
    pub fn detect_tool_path() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            detect_windows_tool_path()
        } else if cfg!(target_os = "macos") {
            let path = PathBuf::from("/Applications/Blender.app/Contents/MacOS/Blender");
            path.exists().then_some(path)
        } else {
            let path = PathBuf::from("/usr/bin/blender");
            path.exists().then_some(path)
        }
    }
}

/// Picks the newest versioned install under the default Windows location.
fn detect_windows_tool_path() -> Option<PathBuf> {
    let base = Path::new("C:/Program Files/Blender Foundation");
    let mut candidates: Vec<PathBuf> = fs::read_dir(base)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().join("blender.exe"))
        .filter(|p| p.is_file())
        .collect();
    candidates.sort();
    candidates.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_instruction_uses_the_right_operator() {
        let path = Path::new("/tmp/part.stl");
        assert_eq!(
            InterchangeFormat::Stl.export_instruction(path),
            "bpy.ops.export_mesh.stl(filepath = '/tmp/part.stl', check_existing = False)"
        );
        let path = Path::new("/tmp/part.obj");
        assert!(
            InterchangeFormat::Obj
                .export_instruction(path)
                .starts_with("bpy.ops.export_scene.obj(")
        );
    }

    #[test]
    fn unverified_config_refuses_to_hand_out_the_tool() {
        let mut config = BlenderConfig::default();
        assert!(config.require_verified().is_err());

        config.tool_path = Some(PathBuf::from("/nonexistent/tool"));
        let err = config.require_verified().unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn verify_scans_probe_output_for_the_verdict() {
        let mut config = BlenderConfig {
            tool_path: Some(std::env::temp_dir()),
            ..Default::default()
        };
        // Banner noise before the verdict line must be skipped.
        let verified = config
            .verify_with(|_| Ok("Blender 3.6.0 (hash abc)\nTrue\n".to_string()))
            .unwrap();
        assert!(verified);
        assert!(config.is_verified());
    }

    #[test]
    fn verify_flags_outdated_versions() {
        let mut config = BlenderConfig {
            tool_path: Some(std::env::temp_dir()),
            ..Default::default()
        };
        let verified = config.verify_with(|_| Ok("False\n".to_string())).unwrap();
        assert!(!verified);
        assert!(config.is_outdated());
        assert!(config.require_verified().is_err());
    }

    #[test]
    fn settings_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let config = BlenderConfig {
            tool_path: Some(PathBuf::from("/usr/bin/blender")),
            interchange: InterchangeFormat::Obj,
            live_reload: false,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = BlenderConfig::load(&path).unwrap();
        assert_eq!(loaded.tool_path, config.tool_path);
        assert_eq!(loaded.interchange, InterchangeFormat::Obj);
        assert!(!loaded.live_reload);
        // Verification state never persists.
        assert!(!loaded.is_verified());
    }
}
