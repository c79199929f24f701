use std::io;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::PreflightError;
use crate::job_engine::types::{ExclusionSet, PreflightReport, PreflightResult};
use crate::system_integration::{get_available_space, nearest_existing_ancestor};

/// Estimates whether the target volume can hold the source tree.
///
/// The exclusion match here is a plain case-insensitive substring test. The copy
/// tool applies its own matching rules to `/XD`/`/XF`, so the estimate is an
/// approximation of what will actually be transferred.
pub fn estimate(
    source: &Path,
    target: &Path,
    exclusions: &ExclusionSet,
) -> Result<PreflightResult, PreflightError> {
    estimate_report(source, target, exclusions).map(|report| report.result())
}

/// Free-space query for the volume backing a path.
pub type SpaceProbe = fn(&Path) -> io::Result<u64>;

/// Same as [`estimate`] but keeps the measured numbers.
pub fn estimate_report(
    source: &Path,
    target: &Path,
    exclusions: &ExclusionSet,
) -> Result<PreflightReport, PreflightError> {
    estimate_report_with(source, target, exclusions, get_available_space)
}

/// [`estimate_report`] with the free-space query supplied by the caller.
pub fn estimate_report_with(
    source: &Path,
    target: &Path,
    exclusions: &ExclusionSet,
    available_space: SpaceProbe,
) -> Result<PreflightReport, PreflightError> {
    let available_bytes = available_space_for(target, available_space)?;
    let required_bytes = measure_source(source, exclusions)?;

    tracing::debug!(
        source = %source.display(),
        target = %target.display(),
        required_bytes,
        available_bytes,
        "Preflight estimate"
    );

    Ok(PreflightReport {
        required_bytes,
        available_bytes,
    })
}

/// Free bytes for `target`, measured on its nearest existing ancestor since the
/// copy tool creates missing target directories itself.
fn available_space_for(target: &Path, available_space: SpaceProbe) -> Result<u64, PreflightError> {
    let probe =
        nearest_existing_ancestor(target).ok_or_else(|| PreflightError::VolumeUnavailable {
            path: target.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "no existing ancestor"),
        })?;

    available_space(&probe).map_err(|source| PreflightError::VolumeUnavailable {
        path: target.to_path_buf(),
        source,
    })
}

/// Sums the size of every file under `source` that survives the exclusions.
///
/// Directories whose full path matches a token are pruned with their whole
/// subtree; files are matched on their name only. Entries that cannot be read
/// while walking are skipped.
pub fn measure_source(source: &Path, exclusions: &ExclusionSet) -> Result<u64, PreflightError> {
    // The walk itself must be able to start.
    std::fs::read_dir(source).map_err(|e| PreflightError::SourceUnreadable {
        path: source.to_path_buf(),
        source: e,
    })?;

    let mut total = 0u64;

    let walker = WalkDir::new(source).into_iter().filter_entry(|entry| {
        !(entry.file_type().is_dir() && exclusions.matches(&entry.path().to_string_lossy()))
    });

    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_dir() {
            continue;
        }

        if exclusions.matches(&entry.file_name().to_string_lossy()) {
            continue;
        }

        // Follows symlinks; broken links and permission errors just don't count.
        match std::fs::metadata(entry.path()) {
            Ok(meta) if meta.is_file() => total += meta.len(),
            _ => {}
        }
    }

    Ok(total)
}
