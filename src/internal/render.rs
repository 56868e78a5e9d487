use crate::error::{Error, Result};
use crate::internal::models::{ClipRect, JobState, NormalizedMessage, RenderJob};
use anyhow::{Context, anyhow};
use std::time::Duration;

pub const DEFAULT_PREVIEW_URL: &str = "https://api.slack.com/docs/messages/builder";
pub const DEFAULT_LOADING_SELECTOR: &str = "#message_loading_indicator";
pub const DEFAULT_CONTAINER_SELECTOR: &str = "#msgs_div";
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Browser primitives the orchestrator needs from a render session.
///
/// One surface is one session: it is used for one job at a time and closed
/// once at the end of the run.
#[allow(async_fn_in_trait)]
pub trait RenderSurface {
    /// Navigate the session to `url`.
    async fn open(&mut self, url: &str) -> anyhow::Result<()>;

    /// Resolve once the element matched by `selector` is hidden or gone.
    /// Unbounded; the caller applies the timeout.
    async fn wait_hidden(&mut self, selector: &str) -> anyhow::Result<()>;

    /// Bounding box of the element matched by `selector`.
    async fn element_rect(&mut self, selector: &str) -> anyhow::Result<ClipRect>;

    /// PNG of the page clipped to `clip`.
    async fn screenshot(&mut self, clip: ClipRect) -> anyhow::Result<Vec<u8>>;

    /// Tear the session down.
    async fn close(self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub preview_url: String,
    pub loading_selector: String,
    pub container_selector: String,
    pub timeout: Duration,
    pub padding: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            loading_selector: DEFAULT_LOADING_SELECTOR.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            timeout: DEFAULT_RENDER_TIMEOUT,
            padding: 0.0,
        }
    }
}

impl RenderOptions {
    /// `{preview_url}?msg={payload}` with the payload URI-component encoded.
    pub fn preview_url_for(&self, message: &NormalizedMessage) -> String {
        let sep = if self.preview_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}msg={}",
            self.preview_url,
            sep,
            urlencoding::encode(&message.to_json())
        )
    }
}

/// Why a single attempt did not produce an image.
#[derive(Debug)]
enum AttemptError {
    TimedOut(Duration),
    Failed(anyhow::Error),
}

impl AttemptError {
    fn state(&self) -> JobState {
        match self {
            Self::TimedOut(_) => JobState::TimedOut,
            Self::Failed(_) => JobState::Failed,
        }
    }

    fn into_anyhow(self) -> anyhow::Error {
        match self {
            Self::TimedOut(limit) => anyhow!("render did not complete within {limit:?}"),
            Self::Failed(e) => e,
        }
    }
}

/// Drives a [`RenderSurface`] through one job at a time with a single retry.
pub struct RenderOrchestrator<S> {
    surface: S,
    options: RenderOptions,
    on_retry: Option<Box<dyn FnMut(&RenderJob, &anyhow::Error)>>,
}

impl<S: RenderSurface> RenderOrchestrator<S> {
    pub fn new(surface: S, options: RenderOptions) -> Self {
        Self {
            surface,
            options,
            on_retry: None,
        }
    }

    /// Called between the failed first attempt and the retry.
    pub fn on_retry(mut self, hook: impl FnMut(&RenderJob, &anyhow::Error) + 'static) -> Self {
        self.on_retry = Some(Box::new(hook));
        self
    }

    /// Render one job: up to two attempts, then `Error::Render`.
    #[tracing::instrument(skip(self, job), fields(path = %job.output_path.display()))]
    pub async fn render(&mut self, job: &RenderJob) -> Result<Vec<u8>> {
        let mut state = JobState::Pending;
        let mut first_attempt = true;

        loop {
            state = transition(state, JobState::Submitted);
            match self.attempt(&job.message).await {
                Ok(image) => {
                    transition(state, JobState::Rendered);
                    return Ok(image);
                }
                Err(err) => {
                    state = transition(state, err.state());
                    let cause = err.into_anyhow();
                    if !first_attempt {
                        transition(state, JobState::FatalFailed);
                        return Err(Error::render(&job.output_path, cause));
                    }
                    tracing::warn!(error = %format!("{cause:#}"), "render attempt failed, retrying");
                    if let Some(hook) = self.on_retry.as_mut() {
                        hook(job, &cause);
                    }
                    state = transition(state, JobState::Retrying);
                    first_attempt = false;
                }
            }
        }
    }

    async fn attempt(&mut self, message: &NormalizedMessage) -> std::result::Result<Vec<u8>, AttemptError> {
        let url = self.options.preview_url_for(message);
        self.surface
            .open(&url)
            .await
            .context("failed to open message preview")
            .map_err(AttemptError::Failed)?;

        let limit = self.options.timeout;
        match tokio::time::timeout(limit, self.surface.wait_hidden(&self.options.loading_selector)).await {
            Err(_) => return Err(AttemptError::TimedOut(limit)),
            Ok(Err(e)) => {
                return Err(AttemptError::Failed(
                    e.context("failed waiting for the loading indicator"),
                ));
            }
            Ok(Ok(())) => {}
        }

        let rect = self
            .surface
            .element_rect(&self.options.container_selector)
            .await
            .context("failed to locate message container")
            .map_err(AttemptError::Failed)?;

        self.surface
            .screenshot(rect.padded(self.options.padding))
            .await
            .context("failed to capture screenshot")
            .map_err(AttemptError::Failed)
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

fn transition(from: JobState, to: JobState) -> JobState {
    tracing::debug!(%from, %to, "job state");
    to
}
