use crate::error::{Error, Result};
use crate::internal::extract::{extract_file, fixture_category};
use crate::internal::locator::discover;
use crate::internal::models::{ExtractedPayload, RenderJob};
use crate::internal::normalize::normalize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};

/// Categories whose fixtures are never rendered.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    categories: HashSet<String>,
}

impl ExclusionFilter {
    pub fn new<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: categories.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_excluded(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}

/// `{output_root}/{category}/{snapshot_name}.png`
///
/// A `/` in either part nests a directory; empty and `.` segments are
/// dropped, so a leading `/` cannot reset the path to the filesystem root.
/// Returns `None` when a segment is `..` or otherwise not a plain name.
pub fn output_path(output_root: &Path, category: &str, snapshot_name: &str) -> Option<PathBuf> {
    let file_name = format!("{snapshot_name}.png");
    let mut path = output_root.to_path_buf();
    for segment in category.split('/').chain(file_name.split('/')) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (None, _) | (Some(Component::CurDir), None) => {}
            (Some(Component::Normal(part)), None) => path.push(part),
            _ => return None,
        }
    }
    Some(path)
}

/// Every job of a run, keyed (and therefore ordered) by output path.
#[derive(Debug, Default)]
pub struct JobPlan {
    pub jobs: BTreeMap<PathBuf, RenderJob>,
    pub excluded_files: usize,
    pub unmatched_files: usize,
    pub failed_entries: usize,
}

impl JobPlan {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Add a job for `payload`, refusing to overwrite another job's output.
    ///
    /// A snapshot name that would place its image outside the category
    /// directory is an extraction error for that entry only.
    pub fn insert(&mut self, output_root: &Path, payload: ExtractedPayload) -> Result<()> {
        let Some(path) = output_path(output_root, &payload.category, &payload.snapshot_name)
        else {
            return Err(Error::extraction(
                payload.source_file,
                payload.snapshot_name,
                "snapshot name does not resolve to a file inside the output directory",
            ));
        };
        let origin = format!("{} [{}]", payload.source_file, payload.snapshot_name);

        match self.jobs.entry(path) {
            Entry::Occupied(existing) => Err(Error::PathCollision {
                path: existing.key().clone(),
                first: existing.get().origin.clone(),
                second: origin,
            }),
            Entry::Vacant(slot) => {
                let output_path = slot.key().clone();
                slot.insert(RenderJob {
                    output_path,
                    message: normalize(payload.value),
                    origin,
                });
                Ok(())
            }
        }
    }
}

/// Discover, extract, filter and normalize every fixture under `input_root`.
///
/// Completes fully before returning, so the job set is fixed before any
/// rendering starts.
#[tracing::instrument(skip(filter))]
pub fn plan_jobs(input_root: &Path, output_root: &Path, filter: &ExclusionFilter) -> Result<JobPlan> {
    let mut plan = JobPlan::default();

    for file in discover(input_root)? {
        let file = file?;

        let Some(category) = fixture_category(&file.relative_path) else {
            tracing::debug!(file = %file.relative_path, "not a fixture path, skipping");
            plan.unmatched_files += 1;
            continue;
        };

        if filter.is_excluded(category) {
            tracing::info!(file = %file.relative_path, category, "category excluded");
            plan.excluded_files += 1;
            continue;
        }

        let extraction = extract_file(&file, category);
        for failure in &extraction.failures {
            tracing::warn!("{failure}");
        }
        plan.failed_entries += extraction.failures.len();

        for payload in extraction.payloads {
            match plan.insert(output_root, payload) {
                Ok(()) => {}
                Err(e) if !e.is_fatal() => {
                    tracing::warn!("{e}");
                    plan.failed_entries += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    tracing::info!(
        jobs = plan.len(),
        excluded = plan.excluded_files,
        failed_entries = plan.failed_entries,
        "planned render jobs"
    );
    Ok(plan)
}
