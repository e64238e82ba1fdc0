//! Client side of the remote conversion service.
//!
//! A job is submitted as a multipart upload. The service either answers
//! with a finished result straight away or with a job id, whose status is
//! then polled until it is terminal. The client never downloads the result,
//! it only resolves the link.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::ExportConfig;
use crate::errors::{Result, RigError};

/// Largest file the service accepts.
pub const MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Extensions the service can convert.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["fbx", "bvh", "gltf", "glb"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemoteOperation {
    /// Retarget an animation onto a character and export the result.
    Retarget,
    /// Rig an unrigged character.
    AutoRig,
    /// Generate a procedural sprint cycle for a character.
    GenerateSprint,
}

impl RemoteOperation {
    /// Path of the submission endpoint relative to the API base.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            RemoteOperation::Retarget => "export/retarget",
            RemoteOperation::AutoRig => "export/autorig",
            RemoteOperation::GenerateSprint => "export/sprint",
        }
    }

    #[must_use]
    pub fn requires_animation(self) -> bool {
        matches!(self, RemoteOperation::Retarget)
    }
}

impl std::str::FromStr for RemoteOperation {
    type Err = RigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "retarget" => Ok(RemoteOperation::Retarget),
            "autorig" | "auto-rig" => Ok(RemoteOperation::AutoRig),
            "sprint" | "generate-sprint" => Ok(RemoteOperation::GenerateSprint),
            other => Err(RigError::InvalidExportInput(format!("unknown remote operation '{other}'"))),
        }
    }
}

/// A file attached to a submission.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Reads a local file, keeping its file name.
    pub async fn read(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self { file_name, bytes })
    }

    /// Checks extension and size the same way the service does.
    pub fn validate(&self, role: &str) -> Result<()> {
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, e)| e.to_ascii_lowercase())
            .unwrap_or_default();
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(RigError::InvalidExportInput(format!(
                "invalid {role} file type: '{ext}'. Allowed: FBX, BVH, GLTF, GLB"
            )));
        }
        if self.bytes.is_empty() {
            return Err(RigError::InvalidExportInput(format!("{role} file is empty")));
        }
        if self.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(RigError::InvalidExportInput(format!(
                "{role} file is {} bytes, the limit is {MAX_UPLOAD_BYTES}",
                self.bytes.len()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub operation: RemoteOperation,
    pub character: UploadFile,
    pub animation: Option<UploadFile>,
}

impl ExportRequest {
    pub fn validate(&self) -> Result<()> {
        self.character.validate("character")?;
        match (&self.animation, self.operation.requires_animation()) {
            (Some(animation), _) => animation.validate("animation"),
            (None, true) => Err(RigError::InvalidExportInput("animation file is required".to_string())),
            (None, false) => Ok(()),
        }
    }
}

/// A finished conversion as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    pub filename: String,
    #[serde(default)]
    pub file_size: u64,
    pub download_url: String,
    #[serde(default)]
    pub created_at: String,
}

/// Answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SubmitResponse {
    /// The job was queued; poll its status.
    Job { job_id: String },
    /// The service finished synchronously.
    Completed(ExportResult),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusReport {
    pub status: JobStatus,
    #[serde(default)]
    pub progress: Option<f32>,
    #[serde(default)]
    pub result_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Terminal success of a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    /// `None` when the service answered the submission synchronously.
    pub job_id: Option<String>,
    pub download_url: String,
}

/// Transport to the conversion service.
pub trait ExportJobApi: Send + Sync {
    fn submit(&self, request: &ExportRequest) -> impl std::future::Future<Output = Result<SubmitResponse>> + Send;

    fn status(&self, job_id: &str) -> impl std::future::Future<Output = Result<JobStatusReport>> + Send;

    /// Turns a result reference (absolute URL, server path or bare file name)
    /// into a downloadable link.
    fn download_url(&self, reference: &str) -> Result<String>;
}

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cancellation flag of one remote job.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) was called.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

// ============================================================================
// Job driver
// ============================================================================

/// Validates, submits and, if needed, polls one job to completion.
pub async fn run_job<A: ExportJobApi>(
    api: &A,
    request: &ExportRequest,
    config: &ExportConfig,
    cancel: &CancelToken,
    on_progress: impl FnMut(&JobStatusReport),
) -> Result<ExportOutcome> {
    request.validate()?;

    let response = tokio::select! {
        response = api.submit(request) => response?,
        () = cancel.cancelled() => return Err(RigError::Cancelled),
    };

    match response {
        SubmitResponse::Completed(result) => {
            let download_url = api.download_url(&result.download_url)?;
            log::info!("Remote {:?} finished synchronously: {download_url}", request.operation);
            Ok(ExportOutcome {
                job_id: None,
                download_url,
            })
        }
        SubmitResponse::Job { job_id } => {
            log::debug!("Remote {:?} queued as job {job_id}", request.operation);
            poll_job(api, &job_id, config, cancel, on_progress).await
        }
    }
}

/// Polls `job_id` until it succeeds, fails, is cancelled, or the transport
/// fails `max_consecutive_poll_failures` times in a row.
///
/// Transport failures back off exponentially; a successful poll resets the
/// failure count.
pub async fn poll_job<A: ExportJobApi>(
    api: &A,
    job_id: &str,
    config: &ExportConfig,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(&JobStatusReport),
) -> Result<ExportOutcome> {
    let max_failures = config.max_consecutive_poll_failures.max(1);
    let mut failures = 0u32;

    loop {
        if cancel.is_cancelled() {
            log::debug!("Polling of job {job_id} cancelled");
            return Err(RigError::Cancelled);
        }

        match api.status(job_id).await {
            Ok(report) => {
                failures = 0;
                on_progress(&report);
                match report.status {
                    JobStatus::Success => {
                        let reference = report.result_url.ok_or_else(|| {
                            RigError::RemoteJobFailed("job succeeded without a result".to_string())
                        })?;
                        let download_url = api.download_url(&reference)?;
                        log::info!("Remote job {job_id} succeeded: {download_url}");
                        return Ok(ExportOutcome {
                            job_id: Some(job_id.to_string()),
                            download_url,
                        });
                    }
                    JobStatus::Failed => {
                        let reason = report.error.unwrap_or_else(|| "unknown error".to_string());
                        log::error!("Remote job {job_id} failed: {reason}");
                        return Err(RigError::RemoteJobFailed(reason));
                    }
                    JobStatus::Queued | JobStatus::Running => {}
                }
            }
            Err(e) => {
                failures += 1;
                log::warn!("Status poll of job {job_id} failed (attempt {failures}/{max_failures}): {e}");
                if failures >= max_failures {
                    return Err(RigError::PollFailed {
                        attempts: failures,
                        last_error: e.to_string(),
                    });
                }
            }
        }

        tokio::select! {
            () = tokio::time::sleep(config.backoff(failures)) => {}
            () = cancel.cancelled() => {
                log::debug!("Polling of job {job_id} cancelled");
                return Err(RigError::Cancelled);
            }
        }
    }
}

/// Runs at most one remote job at a time against one service.
///
/// Dropping the exporter cancels the job in flight.
pub struct RemoteExporter<A: ExportJobApi> {
    api: A,
    config: ExportConfig,
    active: parking_lot::Mutex<Option<CancelToken>>,
}

impl<A: ExportJobApi> RemoteExporter<A> {
    pub fn new(api: A, config: ExportConfig) -> Self {
        Self {
            api,
            config,
            active: parking_lot::Mutex::new(None),
        }
    }

    #[inline]
    pub fn api(&self) -> &A {
        &self.api
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Submits `request` and waits for its terminal state.
    ///
    /// Fails with [`RigError::InvalidExportInput`] while another job runs.
    pub async fn export(&self, request: &ExportRequest, on_progress: impl FnMut(&JobStatusReport)) -> Result<ExportOutcome> {
        let guard = {
            let mut active = self.active.lock();
            if active.is_some() {
                return Err(RigError::InvalidExportInput("a remote job is already running".to_string()));
            }
            let token = CancelToken::new();
            *active = Some(token.clone());
            ActiveJob {
                slot: &self.active,
                token,
            }
        };

        run_job(&self.api, request, &self.config, &guard.token, on_progress).await
    }

    /// Cancels the job in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = self.active.lock().as_ref() {
            token.cancel();
        }
    }
}

/// Occupies the exporter's job slot. Releasing it, on completion or when
/// the export future is dropped, cancels the token and frees the slot.
struct ActiveJob<'a> {
    slot: &'a parking_lot::Mutex<Option<CancelToken>>,
    token: CancelToken,
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.token.cancel();
        self.slot.lock().take();
    }
}

impl<A: ExportJobApi> Drop for RemoteExporter<A> {
    fn drop(&mut self) {
        self.cancel();
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Resolves a result reference against the API base URL.
///
/// Absolute URLs pass through, server paths keep the base origin, and bare
/// file names go through the download endpoint.
#[cfg(feature = "http")]
pub fn resolve_download_url(base: &url::Url, reference: &str) -> Result<String> {
    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(url::Url::parse(reference)?.to_string());
    }
    if reference.starts_with('/') {
        return Ok(base.join(reference)?.to_string());
    }
    Ok(with_trailing_slash(base).join("export/download/")?.join(reference)?.to_string())
}

#[cfg(feature = "http")]
fn with_trailing_slash(url: &url::Url) -> url::Url {
    let mut url = url.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(feature = "http")]
#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`ExportJobApi`] over HTTP with multipart uploads.
#[cfg(feature = "http")]
pub struct HttpExportClient {
    base_url: url::Url,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpExportClient {
    pub fn new(config: &ExportConfig) -> Result<Self> {
        let base_url = with_trailing_slash(&url::Url::parse(&config.base_url)?);
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { base_url, client })
    }

    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &url::Url {
        &self.base_url
    }

    fn part(file: &UploadFile) -> reqwest::multipart::Part {
        reqwest::multipart::Part::bytes(file.bytes.clone()).file_name(file.file_name.clone())
    }

    /// Maps a non-success response to an error, keeping the service's message.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.json::<ErrorBody>().await.ok().map(|b| b.error);
        match (status.as_u16(), message) {
            (400..=499, Some(message)) => Err(RigError::InvalidExportInput(message)),
            (_, Some(message)) => Err(RigError::RemoteJobFailed(message)),
            (code, None) => Err(RigError::HttpResponseError { status: code }),
        }
    }
}

#[cfg(feature = "http")]
impl ExportJobApi for HttpExportClient {
    async fn submit(&self, request: &ExportRequest) -> Result<SubmitResponse> {
        let mut form = reqwest::multipart::Form::new().part("character", Self::part(&request.character));
        if let Some(animation) = &request.animation {
            form = form.part("animation", Self::part(animation));
        }

        let url = self.base_url.join(request.operation.endpoint())?;
        let response = self.client.post(url).multipart(form).send().await?;
        Ok(Self::check(response).await?.json::<SubmitResponse>().await?)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport> {
        let url = self.base_url.join("export/jobs/")?.join(job_id)?;
        let response = self.client.get(url).send().await?;
        Ok(Self::check(response).await?.json::<JobStatusReport>().await?)
    }

    fn download_url(&self, reference: &str) -> Result<String> {
        resolve_download_url(&self.base_url, reference)
    }
}
