//! Identity of imported nodes.
//!
//! A multi-object file is split into fragments at read time; each fragment's
//! node remembers a synthetic filename `{stem}_curasplit_{n}.blend` where `n`
//! is the 1-based object index. Internally indices are 0-based; the encoder
//! and decoder below are exact inverses of each other, including that
//! off-by-one, because identity resolution attaches mesh data to nodes purely
//! by these names.
//!
//! The filename encoding is kept for interop with externally-dropped files;
//! the [`SourceMap`] is the primary, out-of-band identity store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::host::NodeId;

/// Marker embedded in the synthetic filename of a split fragment.
pub const SPLIT_MARKER: &str = "_curasplit_";

/// Extension of the external tool's native scene format.
pub const NATIVE_EXTENSION: &str = "blend";

/// Where a node's mesh data came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceReference {
    /// The user-facing source file (always a native-format path).
    pub original_path: PathBuf,
    /// Which object of the file this node is; `None` means the whole file.
    pub split_index: Option<usize>,
}

impl SourceReference {
    pub fn whole(original_path: impl Into<PathBuf>) -> Self {
        Self {
            original_path: original_path.into(),
            split_index: None,
        }
    }

    pub fn split(original_path: impl Into<PathBuf>, index: usize) -> Self {
        Self {
            original_path: original_path.into(),
            split_index: Some(index),
        }
    }

    /// The filename recorded on the node for this reference.
    pub fn recorded_path(&self) -> PathBuf {
        match self.split_index {
            Some(index) => encode(&self.original_path, index),
            None => self.original_path.clone(),
        }
    }
}

/// Encodes (original path, 0-based index) into the synthetic fragment name.
pub fn encode(original_path: &Path, index: usize) -> PathBuf {
    let s = original_path.to_string_lossy();
    let dotted = format!(".{NATIVE_EXTENSION}");
    let stem = s.strip_suffix(dotted.as_str()).unwrap_or(&s);
    PathBuf::from(format!(
        "{}{}{}.{}",
        stem,
        SPLIT_MARKER,
        index + 1,
        NATIVE_EXTENSION
    ))
}

/// Decodes a synthetic fragment name back into (original path, 0-based index).
///
/// Returns `None` when the path carries no split marker, i.e. it already
/// denotes an undecomposed file.
pub fn decode(path: &Path) -> Option<(PathBuf, usize)> {
    let s = path.to_string_lossy();
    let marker = s.find(SPLIT_MARKER)?;
    let rest = &s[marker + SPLIT_MARKER.len()..];
    let dotted = format!(".{NATIVE_EXTENSION}");
    let digits = rest.strip_suffix(dotted.as_str())?;
    let one_based: usize = digits.parse().ok()?;
    if one_based == 0 {
        return None;
    }
    let original = PathBuf::from(format!("{}.{}", &s[..marker], NATIVE_EXTENSION));
    Some((original, one_based - 1))
}

/// Whether a path is a split-fragment artifact.
pub fn is_split_path(path: &Path) -> bool {
    decode(path).is_some()
}

/// Out-of-band identity map from host node ids to source references.
#[derive(Debug, Default)]
pub struct SourceMap {
    entries: HashMap<NodeId, SourceReference>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: NodeId, reference: SourceReference) {
        self.entries.insert(id, reference);
    }

    pub fn get(&self, id: NodeId) -> Option<&SourceReference> {
        self.entries.get(&id)
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SourceReference> {
        self.entries.remove(&id)
    }

    /// Resolves a node to its source, falling back to decoding the node's
    /// recorded filename when the map has no entry.
    pub fn resolve(&self, id: NodeId, recorded: &Path) -> SourceReference {
        if let Some(reference) = self.entries.get(&id) {
            return reference.clone();
        }
        match decode(recorded) {
            Some((original, index)) => SourceReference::split(original, index),
            None => SourceReference::whole(recorded),
        }
    }
}
