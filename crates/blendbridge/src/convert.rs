//! Converting native files into host scene nodes.
//!
//! Single-object files take one synchronous conversion; multi-object files
//! fan out one subprocess per object index, each exporting exactly one object
//! to its own temporary interchange file. Jobs are joined strictly in index
//! order and each result is correlated through explicit (index, temp path)
//! bookkeeping, never through completion order.

use std::path::{Path, PathBuf};

use blendbridge_error::{BridgeError, Result};
use log::{debug, warn};
use uuid::Uuid;

use crate::config::InterchangeFormat;
use crate::host::{MeshImporter, SceneNode};
use crate::ident;
use crate::invoker::{ConversionJob, ToolRunner};

/// A temporary interchange artifact, deleted (with its material sidecar)
/// when dropped, whether or not the import succeeded.
#[derive(Debug)]
pub(crate) struct TempExport {
    path: PathBuf,
    sidecar: Option<PathBuf>,
}

impl TempExport {
    /// Assigns a fresh export path next to the source file. The randomized
    /// token keeps concurrent jobs for the same source from colliding; the
    /// index suffix keeps the name readable in logs.
    fn new(source: &Path, index: Option<usize>, format: InterchangeFormat) -> Self {
        let dir = source.parent().unwrap_or_else(|| Path::new("."));
        let token = Uuid::new_v4().simple().to_string();
        let name = match index {
            Some(index) => format!("cura_temp_{}_{}.{}", token, index, format.extension()),
            None => format!("cura_temp_{}.{}", token, format.extension()),
        };
        let path = dir.join(name);
        let sidecar = format
            .has_material_sidecar()
            .then(|| path.with_extension("mtl"));
        Self { path, sidecar }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempExport {
    fn drop(&mut self) {
        if self.path.is_file() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("could not remove {}: {e}", self.path.display());
            }
        }
        if let Some(sidecar) = &self.sidecar {
            if sidecar.is_file() {
                if let Err(e) = std::fs::remove_file(sidecar) {
                    warn!("could not remove {}: {e}", sidecar.display());
                }
            }
        }
    }
}

/// Drives conversions for one read call.
pub struct Converter<'a> {
    runner: &'a dyn ToolRunner,
    importer: &'a dyn MeshImporter,
    format: InterchangeFormat,
}

impl<'a> Converter<'a> {
    pub fn new(
        runner: &'a dyn ToolRunner,
        importer: &'a dyn MeshImporter,
        format: InterchangeFormat,
    ) -> Self {
        Self {
            runner,
            importer,
            format,
        }
    }

    /// Converts a file known to hold exactly one mesh object. The node keeps
    /// the undecorated original path; no split suffix applies.
    pub fn convert_single(&self, file: &Path) -> Result<Box<dyn SceneNode>> {
        let temp = TempExport::new(file, None, self.format);
        let job = ConversionJob::export_single(file, self.format.export_instruction(temp.path()));
        let output = self.runner.run(&job)?;
        if !output.success {
            return Err(
                BridgeError::convert_tool_failed("single-object export failed")
                    .with_file_path(file),
            );
        }
        let mut node = self.import_export(&temp, file, None)?;
        node.set_source_file_name(file.to_path_buf());
        Ok(node)
    }

    /// Converts a file with `count >= 2` mesh objects into `count` nodes,
    /// one subprocess per object, all running concurrently.
    pub fn convert_split(&self, file: &Path, count: usize) -> Result<Vec<Box<dyn SceneNode>>> {
        debug_assert!(count >= 2);
        debug!("splitting {} into {} objects", file.display(), count);

        // Temp paths are assigned before any job starts; launch order is
        // ascending by index.
        let mut pending = Vec::with_capacity(count);
        for index in 0..count {
            let temp = TempExport::new(file, Some(index), self.format);
            let job = ConversionJob::export_indexed(
                file,
                self.format.export_instruction(temp.path()),
                index,
            );
            let child = self.runner.spawn(&job)?;
            pending.push((index, temp, child));
        }

        // Join in index order regardless of completion order. On failure the
        // remaining children are still reaped so their temp files (owned by
        // the TempExport guards) can be removed.
        let mut nodes: Vec<Box<dyn SceneNode>> = Vec::with_capacity(count);
        let mut failure: Option<BridgeError> = None;
        for (index, temp, mut child) in pending {
            if failure.is_some() {
                let _ = child.wait();
                continue;
            }
            match self.join_one(file, index, &temp, child.as_mut()) {
                Ok(node) => nodes.push(node),
                Err(e) => failure = Some(e),
            }
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(nodes),
        }
    }

    /// Re-converts exactly one object of a previously split file; used when a
    /// change notification names a split fragment.
    pub fn convert_indexed(&self, file: &Path, index: usize) -> Result<Box<dyn SceneNode>> {
        let temp = TempExport::new(file, Some(index), self.format);
        let job =
            ConversionJob::export_indexed(file, self.format.export_instruction(temp.path()), index);
        let output = self.runner.run(&job)?;
        if !output.success {
            return Err(BridgeError::convert_tool_failed("indexed export failed")
                .with_file_path(file)
                .with_object_index(index));
        }
        let mut node = self.import_export(&temp, file, Some(index))?;
        node.set_source_file_name(ident::encode(file, index));
        Ok(node)
    }

    fn join_one(
        &self,
        file: &Path,
        index: usize,
        temp: &TempExport,
        child: &mut dyn crate::invoker::ToolChild,
    ) -> Result<Box<dyn SceneNode>> {
        if !child.wait()? {
            return Err(BridgeError::convert_tool_failed("indexed export failed")
                .with_file_path(file)
                .with_object_index(index));
        }
        let mut node = self.import_export(temp, file, Some(index))?;
        node.set_source_file_name(ident::encode(file, index));
        Ok(node)
    }

    /// Hands the export to the host importer, distinguishing a missing file
    /// (permission/IO problem) from an importer failure on an existing file
    /// (format too complex for this interchange type).
    fn import_export(
        &self,
        temp: &TempExport,
        source: &Path,
        index: Option<usize>,
    ) -> Result<Box<dyn SceneNode>> {
        if !temp.path().is_file() {
            let mut err = BridgeError::convert_permission_denied(format!(
                "expected export {} never appeared",
                temp.path().display()
            ))
            .with_file_path(source);
            if let Some(index) = index {
                err = err.with_object_index(index);
            }
            return Err(err);
        }
        self.importer.import(temp.path()).map_err(|e| {
            let mut err = BridgeError::convert_too_complex(e.user_message()).with_file_path(source);
            if let Some(index) = index {
                err = err.with_object_index(index);
            }
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::BoundingBox;
    use crate::invoker::{JobPayload, ToolChild, ToolOutput, ToolRunner};
    use crate::testutil::{instruction_path, FakeTool, TestImporter, TestNode};
    use blendbridge_error::ConvertErrorKind;
    use std::cell::RefCell;
    use std::fs;

    fn leftovers(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.starts_with("cura_temp_"))
            .collect()
    }

    #[test]
    fn single_conversion_tags_the_undecorated_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool::with_count(1);
        let importer = TestImporter::new();
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);

        let node = converter.convert_single(&source).unwrap();
        assert_eq!(node.source_file_name(), Some(source.as_path()));
    }

    #[test]
    fn split_conversion_yields_index_ordered_tags() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool::with_count(4);
        let importer = TestImporter::new();
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);

        let nodes = converter.convert_split(&source, 4).unwrap();
        assert_eq!(nodes.len(), 4);
        for (index, node) in nodes.iter().enumerate() {
            let expected = ident::encode(&source, index);
            assert_eq!(node.source_file_name(), Some(expected.as_path()));
        }
    }

    #[test]
    fn join_order_is_by_index_even_when_completion_reverses() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.blend");
        fs::write(&source, b"BLENDER").unwrap();

        // Materializes every export in reverse index order once the last job
        // is spawned, so the highest index "finishes" first and the children
        // finish in the opposite order they were launched.
        struct ReverseTool {
            count: usize,
            pending: RefCell<Vec<PathBuf>>,
        }
        impl ToolRunner for ReverseTool {
            fn run(&self, _job: &ConversionJob) -> Result<ToolOutput> {
                unreachable!()
            }
            fn spawn(&self, job: &ConversionJob) -> Result<Box<dyn ToolChild>> {
                if let JobPayload::ExportIndexed {
                    export_instruction, ..
                } = &job.payload
                {
                    let mut pending = self.pending.borrow_mut();
                    pending.push(instruction_path(export_instruction));
                    if pending.len() == self.count {
                        for path in pending.iter().rev() {
                            fs::write(path, b"reversed\n")?;
                        }
                    }
                }
                Ok(Box::new(DoneChild))
            }
        }
        struct DoneChild;
        impl ToolChild for DoneChild {
            fn wait(&mut self) -> Result<bool> {
                Ok(true)
            }
        }
        struct RecordingImporter {
            imported: RefCell<Vec<PathBuf>>,
        }
        impl MeshImporter for RecordingImporter {
            fn import(&self, path: &Path) -> Result<Box<dyn SceneNode>> {
                self.imported.borrow_mut().push(path.to_path_buf());
                Ok(Box::new(TestNode::new(BoundingBox::new(10.0, 10.0, 10.0))))
            }
        }

        let tool = ReverseTool {
            count: 3,
            pending: RefCell::new(Vec::new()),
        };
        let importer = RecordingImporter {
            imported: RefCell::new(Vec::new()),
        };
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);
        let nodes = converter.convert_split(&source, 3).unwrap();

        // Imports happened in ascending index order, each against the temp
        // file assigned to that index, never correlated by completion.
        let imported = importer.imported.borrow();
        assert_eq!(imported.len(), 3);
        for (index, path) in imported.iter().enumerate() {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.ends_with(&format!("_{index}.stl")), "{name}");
        }
        for (index, node) in nodes.iter().enumerate() {
            let expected = ident::encode(&source, index);
            assert_eq!(node.source_file_name(), Some(expected.as_path()));
        }
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn temp_files_are_gone_after_a_successful_split() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool::with_count(3);
        let importer = TestImporter::new();
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);
        converter.convert_split(&source, 3).unwrap();

        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn missing_export_is_a_permission_error_and_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool {
            count: 3,
            create_files: false,
        };
        let importer = TestImporter::new();
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);

        let err = converter.convert_split(&source, 3).err().unwrap();
        assert!(err.is_convert_kind(ConvertErrorKind::PermissionDenied));
        assert_eq!(err.object_index(), Some(0));
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn importer_failure_on_existing_export_is_too_complex() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool::with_count(1);
        let importer = TestImporter {
            fail: true,
            ..TestImporter::new()
        };
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);

        let err = converter.convert_single(&source).err().unwrap();
        assert!(err.is_convert_kind(ConvertErrorKind::FormatTooComplex));
    }

    #[test]
    fn obj_exports_clean_up_their_material_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("part.blend");
        fs::write(&source, b"BLENDER").unwrap();

        struct ObjTool;
        impl ToolRunner for ObjTool {
            fn run(&self, job: &ConversionJob) -> Result<ToolOutput> {
                if let JobPayload::ExportSingle { export_instruction } = &job.payload {
                    let path = instruction_path(export_instruction);
                    fs::write(&path, b"o cube\n")?;
                    fs::write(path.with_extension("mtl"), b"newmtl default\n")?;
                }
                Ok(ToolOutput {
                    success: true,
                    stdout: String::new(),
                })
            }
            fn spawn(&self, _job: &ConversionJob) -> Result<Box<dyn crate::invoker::ToolChild>> {
                unreachable!()
            }
        }

        let importer = TestImporter::new();
        let converter = Converter::new(&ObjTool, &importer, InterchangeFormat::Obj);
        converter.convert_single(&source).unwrap();

        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn reload_conversion_keeps_the_encoded_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("multi.blend");
        fs::write(&source, b"BLENDER").unwrap();

        let tool = FakeTool::with_count(3);
        let importer = TestImporter::new();
        let converter = Converter::new(&tool, &importer, InterchangeFormat::Stl);

        let node = converter.convert_indexed(&source, 1).unwrap();
        let expected = ident::encode(&source, 1);
        assert_eq!(node.source_file_name(), Some(expected.as_path()));
    }
}
