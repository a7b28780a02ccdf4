//! Output disposition decisions

use std::path::Path;

use serde::Serialize;

use super::artifact::ArtifactKind;

/// Policy applied to every output file of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPolicy {
    /// Replace existing files (merge or overwrite)
    pub replace_file: bool,
    /// File name suffix of protected files
    pub protected_suffix: String,
    /// Directory names holding entity models
    pub entity_dirs: Vec<String>,
}

/// What to do with one output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutputDisposition {
    /// Write the rendered text, creating or overwriting the file
    WriteFresh,
    /// The file exists and must not be replaced; render only to validate
    SkipExists,
    /// The file exists and is protected; do not render or write
    SkipProtectedKind,
    /// Merge the rendered text with the existing file
    MergeWithExisting,
}

impl OutputDisposition {
    /// Whether the template is rendered at all
    pub fn renders(self) -> bool {
        !matches!(self, OutputDisposition::SkipProtectedKind)
    }

    /// Whether the rendered text may reach the disk
    pub fn writes(self) -> bool {
        matches!(
            self,
            OutputDisposition::WriteFresh | OutputDisposition::MergeWithExisting
        )
    }
}

/// Decide the disposition of one output file.
///
/// Rules, first match wins:
/// 1. exists and (replacing is off or the file is marked no-replace): skip
/// 2. exists and protected: skip without rendering
/// 3. exists and merge-eligible: merge
/// 4. otherwise: write fresh
pub fn plan<F>(
    exists: F,
    path: &Path,
    kind: ArtifactKind,
    policy: &OutputPolicy,
    no_replace: bool,
) -> OutputDisposition
where
    F: Fn(&Path) -> bool,
{
    let exists = exists(path);
    if exists && (!policy.replace_file || no_replace) {
        OutputDisposition::SkipExists
    } else if exists && kind == ArtifactKind::Protected {
        OutputDisposition::SkipProtectedKind
    } else if exists && kind.is_merge_eligible() {
        OutputDisposition::MergeWithExisting
    } else {
        OutputDisposition::WriteFresh
    }
}
