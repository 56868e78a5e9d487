use crate::config::Settings;
use crate::error::{Error, Result};
use crate::internal::plan::{ExclusionFilter, JobPlan, plan_jobs};
use crate::internal::render::{RenderOptions, RenderOrchestrator, RenderSurface};
use crate::internal::writer::OutputWriter;
use std::future::Future;
use std::path::PathBuf;

/// What a run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub created: usize,
    pub failed_jobs: Vec<PathBuf>,
    pub failed_entries: usize,
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Build the complete job set for `settings`. Nothing is rendered yet.
pub fn plan(settings: &Settings) -> Result<JobPlan> {
    let filter = ExclusionFilter::new(settings.exclude.iter().cloned());
    plan_jobs(&settings.input, &settings.output, &filter)
}

/// Plan, then render every job through one session obtained from `connect`.
///
/// The session is only opened when there is something to render and is
/// closed again however the render phase ends.
pub async fn run<S, F, Fut>(settings: &Settings, connect: F) -> Result<RunSummary>
where
    S: RenderSurface,
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<S>>,
{
    let plan = plan(settings)?;
    println!(
        "Fetching {} screenshot{} from message builder",
        plan.len(),
        plural(plan.len())
    );

    let mut summary = if plan.is_empty() {
        RunSummary::default()
    } else {
        let surface = connect().await.map_err(Error::session)?;
        let mut writer = OutputWriter::new();
        render_all(&plan, surface, settings.render.options(), &mut writer).await?
    };
    summary.failed_entries = plan.failed_entries;

    println!(
        "Message builder fetching complete. Created {} file{}",
        summary.created,
        plural(summary.created)
    );
    Ok(summary)
}

/// Render and write every job in path order. Per-job render failures are
/// logged and skipped; a write failure stops the batch.
pub async fn render_all<S: RenderSurface>(
    plan: &JobPlan,
    surface: S,
    options: RenderOptions,
    writer: &mut OutputWriter,
) -> Result<RunSummary> {
    let mut orchestrator = RenderOrchestrator::new(surface, options)
        .on_retry(|job, _| println!("Retrying {}", job.output_path.display()));

    let mut summary = RunSummary {
        planned: plan.len(),
        ..Default::default()
    };
    let outcome = render_jobs(&mut orchestrator, plan, writer, &mut summary).await;

    if let Err(e) = orchestrator.into_surface().close().await {
        tracing::warn!(error = %format!("{e:#}"), "failed to close render session");
    }

    outcome.map(|()| summary)
}

async fn render_jobs<S: RenderSurface>(
    orchestrator: &mut RenderOrchestrator<S>,
    plan: &JobPlan,
    writer: &mut OutputWriter,
    summary: &mut RunSummary,
) -> Result<()> {
    for job in plan.jobs.values() {
        match orchestrator.render(job).await {
            Ok(image) => {
                writer.write(&job.output_path, &image)?;
                summary.created = writer.created();
                tracing::info!(path = %job.output_path.display(), origin = %job.origin, "created");
                println!("Created {}", job.output_path.display());
            }
            Err(e) => {
                tracing::error!(origin = %job.origin, "{e}");
                summary.failed_jobs.push(job.output_path.clone());
            }
        }
    }
    Ok(())
}
