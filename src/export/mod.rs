//! Export bridge: local glTF/GLB encoding and remote conversion jobs.

pub mod local;
pub mod remote;

pub use local::{ExportBlob, ExportOptions, assemble_glb, export_local};
#[cfg(feature = "http")]
pub use remote::{HttpExportClient, resolve_download_url};
pub use remote::{
    CancelToken, ExportJobApi, ExportOutcome, ExportRequest, ExportResult, JobStatus, JobStatusReport, RemoteExporter,
    RemoteOperation, SubmitResponse, UploadFile, poll_job, run_job,
};
