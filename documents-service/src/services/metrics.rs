//! Metrics collection and Prometheus export.
//!
//! Initializes the metrics exporter and names the domain counters recorded
//! by the document service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub const DOCUMENTS_UPLOADED: &str = "documents_uploaded_total";
pub const DOCUMENTS_DELETED: &str = "documents_deleted_total";
pub const DOCUMENT_UPLOAD_BYTES: &str = "documents_upload_bytes";
/// Blobs written whose catalog insert failed; input for the reconciliation sweep.
pub const ORPHANED_BLOBS: &str = "documents_orphaned_blobs_total";
pub const INTEGRITY_ERRORS: &str = "documents_integrity_errors_total";

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the metrics recorder.
///
/// Only the first call builds and installs the recorder; concurrent callers
/// wait for it and later calls are no-ops. Errors when another recorder was
/// already installed globally, in which case `/metrics` renders nothing.
pub fn init_metrics() -> Result<(), anyhow::Error> {
    let mut result = Ok(());
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = ::metrics::set_global_recorder(recorder) {
            result = Err(anyhow::anyhow!(
                "Failed to install Prometheus recorder: {}",
                e
            ));
        }
        handle
    });
    result
}

/// Get the current metrics in Prometheus text format.
///
/// Returns a string suitable for the /metrics HTTP endpoint.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}
