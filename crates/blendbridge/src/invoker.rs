//! Building and running external-tool invocations.
//!
//! Every operation against the tool is described by a typed [`ConversionJob`]
//! whose payload is serialized to a single JSON blob and handed to the batch
//! script as the one trailing argument. [`BlenderRunner::argv`] is the only
//! place that decides argument order, so the invoker and the script cannot
//! drift apart.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use blendbridge_error::{BridgeError, ConvertErrorKind, Result};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::config::BlenderConfig;
use crate::script::ScriptHandle;

/// One native source to re-extract during reassembly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySource {
    /// The (prepared) native file to load as a library.
    pub path: PathBuf,
    /// Extract only the object at this position; `None` takes the whole file.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub object_index: Option<usize>,
}

/// The program the batch script runs, with its required inputs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "program", rename_all = "snake_case")]
pub enum JobPayload {
    /// Print the number of visible mesh objects to stdout.
    CountMeshes,
    /// Export the file's only object with the given statement.
    ExportSingle { export_instruction: String },
    /// Export exactly the object at `object_index` (after stripping
    /// non-mesh and hidden objects).
    ExportIndexed {
        export_instruction: String,
        object_index: usize,
    },
    /// Strip a native source file and save it to `destination`.
    WritePrepare { destination: PathBuf },
    /// Assemble the combined output file.
    Write {
        destination: PathBuf,
        import_instructions: Vec<String>,
        library_sources: Vec<LibrarySource>,
    },
}

/// A full tool invocation: the optionally opened source file plus the payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversionJob {
    /// Native file opened positionally by the tool; `None` for `Write`,
    /// which starts from an empty scene.
    pub source: Option<PathBuf>,
    pub payload: JobPayload,
}

impl ConversionJob {
    pub fn count(file: &Path) -> Self {
        Self {
            source: Some(file.to_path_buf()),
            payload: JobPayload::CountMeshes,
        }
    }

    pub fn export_single(file: &Path, export_instruction: String) -> Self {
        Self {
            source: Some(file.to_path_buf()),
            payload: JobPayload::ExportSingle { export_instruction },
        }
    }

    pub fn export_indexed(file: &Path, export_instruction: String, object_index: usize) -> Self {
        Self {
            source: Some(file.to_path_buf()),
            payload: JobPayload::ExportIndexed {
                export_instruction,
                object_index,
            },
        }
    }

    pub fn write_prepare(file: &Path, destination: &Path) -> Self {
        Self {
            source: Some(file.to_path_buf()),
            payload: JobPayload::WritePrepare {
                destination: destination.to_path_buf(),
            },
        }
    }

    pub fn write(
        destination: &Path,
        import_instructions: Vec<String>,
        library_sources: Vec<LibrarySource>,
    ) -> Self {
        Self {
            source: None,
            payload: JobPayload::Write {
                destination: destination.to_path_buf(),
                import_instructions,
                library_sources,
            },
        }
    }

    /// The JSON blob handed to the batch script.
    pub fn payload_json(&self) -> Result<String> {
        serde_json::to_string(&self.payload)
            .map_err(|e| BridgeError::convert(e.to_string(), ConvertErrorKind::PayloadEncode))
    }
}

/// Result of a synchronous tool run.
#[derive(Clone, Debug)]
pub struct ToolOutput {
    pub success: bool,
    pub stdout: String,
}

/// A spawned tool subprocess that can be joined.
pub trait ToolChild: Send {
    /// Waits for the subprocess and reports whether it exited successfully.
    fn wait(&mut self) -> Result<bool>;
}

/// Seam for running conversion jobs; the real implementation shells out to
/// the external tool, tests substitute their own.
pub trait ToolRunner {
    /// Runs a job synchronously, capturing stdout.
    fn run(&self, job: &ConversionJob) -> Result<ToolOutput>;

    /// Spawns a job for fan-out; the caller joins it via [`ToolChild::wait`].
    fn spawn(&self, job: &ConversionJob) -> Result<Box<dyn ToolChild>>;
}

/// Runs jobs against a verified external tool installation.
#[derive(Debug)]
pub struct BlenderRunner {
    tool_path: PathBuf,
    script: ScriptHandle,
}

impl BlenderRunner {
    /// Builds a runner from a verified configuration; refuses unverified ones.
    pub fn from_config(config: &BlenderConfig) -> Result<Self> {
        let tool_path = config.require_verified()?.to_path_buf();
        let script = ScriptHandle::materialize()?;
        Ok(Self { tool_path, script })
    }

    pub fn tool_path(&self) -> &Path {
        &self.tool_path
    }

    /// The argument vector for a job. Centralized so the order
    /// `[source] --background --python <script> -- <payload>` can never
    /// drift out of sync with the script's expectations.
    pub fn argv(&self, job: &ConversionJob) -> Result<Vec<OsString>> {
        let mut args: Vec<OsString> = Vec::with_capacity(6);
        if let Some(source) = &job.source {
            args.push(source.clone().into());
        }
        args.push("--background".into());
        args.push("--python".into());
        args.push(self.script.path().to_path_buf().into());
        args.push("--".into());
        args.push(job.payload_json()?.into());
        Ok(args)
    }

    fn command(&self, job: &ConversionJob) -> Result<Command> {
        let mut command = Command::new(&self.tool_path);
        command.args(self.argv(job)?);
        Ok(command)
    }

    /// Runs a one-off inline expression instead of the batch script.
    pub fn run_expr(&self, source: Option<&Path>, expr: &str) -> Result<ToolOutput> {
        let mut command = Command::new(&self.tool_path);
        if let Some(source) = source {
            command.arg(source);
        }
        command.arg("--background").arg("--python-expr").arg(expr);
        let output = command
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    /// Opens a file in the tool interactively (no `--background`), detached.
    pub fn open_interactive(&self, file: &Path) -> Result<()> {
        debug!("opening {} in {}", file.display(), self.tool_path.display());
        Command::new(&self.tool_path)
            .arg(file)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(())
    }
}

impl ToolRunner for BlenderRunner {
    fn run(&self, job: &ConversionJob) -> Result<ToolOutput> {
        trace!("running job: {:?}", job.payload);
        let output = self
            .command(job)?
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()?;
        Ok(ToolOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn spawn(&self, job: &ConversionJob) -> Result<Box<dyn ToolChild>> {
        trace!("spawning job: {:?}", job.payload);
        let child = self
            .command(job)?
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(Box::new(ProcessChild(child)))
    }
}

struct ProcessChild(std::process::Child);

impl ToolChild for ProcessChild {
    fn wait(&mut self) -> Result<bool> {
        let status = self.0.wait()?;
        Ok(status.success())
    }
}
