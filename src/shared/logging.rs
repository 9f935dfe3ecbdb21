//! Structured logging module for the chat export kit
//!
//! Provides consistent, contextual logging across the crate.
//! Uses structured fields so hosts can filter by operation.

/// Operation tags attached to every log event
#[derive(Debug, Clone, Copy)]
pub enum LogOperation {
    Normalize,
    BranchDetection,
    BranchSelection,
    GranularExport,
    MarkdownExport,
    PdfExport,
    Overlay,
}

impl LogOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogOperation::Normalize => "normalize",
            LogOperation::BranchDetection => "branch_detection",
            LogOperation::BranchSelection => "branch_selection",
            LogOperation::GranularExport => "granular_export",
            LogOperation::MarkdownExport => "markdown_export",
            LogOperation::PdfExport => "pdf_export",
            LogOperation::Overlay => "overlay",
        }
    }
}

/// Install a fmt subscriber honoring `RUST_LOG` (INFO by default).
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}

/// Log format detection result
pub fn log_format_detected(file_name: &str, format: &str) {
    tracing::debug!(
        operation = LogOperation::Normalize.as_str(),
        file_name = file_name,
        format = format,
        "Detected export format"
    );
}

/// Log normalization result
pub fn log_normalize_result(file_name: &str, conversations: usize, messages: usize) {
    tracing::info!(
        operation = LogOperation::Normalize.as_str(),
        file_name = file_name,
        conversation_count = conversations,
        message_count = messages,
        "Export normalized"
    );
}

/// Log a skipped malformed record (not fatal)
pub fn log_record_skipped(file_name: &str, index: usize, reason: &str) {
    tracing::debug!(
        operation = LogOperation::Normalize.as_str(),
        file_name = file_name,
        record_index = index,
        reason = reason,
        "Skipped malformed record"
    );
}

/// Log a graph anomaly repaired by the branch builder
pub fn log_branch_warning(message_uuid: &str, warning: &str) {
    tracing::warn!(
        operation = LogOperation::BranchDetection.as_str(),
        message_uuid = message_uuid,
        warning = warning,
        "Malformed message graph repaired"
    );
}

/// Log branch detection result
pub fn log_branch_result(message_count: usize, branch_points: usize, branches: usize) {
    tracing::debug!(
        operation = LogOperation::BranchDetection.as_str(),
        message_count = message_count,
        branch_point_count = branch_points,
        branch_count = branches,
        "Branch detection completed"
    );
}

/// Log a selection that names a branch the branch point does not have
pub fn log_unknown_selection(branch_point: &str, branch_id: &str) {
    tracing::debug!(
        operation = LogOperation::BranchSelection.as_str(),
        branch_point = branch_point,
        branch_id = branch_id,
        "Selected branch not found, following default continuation"
    );
}

/// Log export start
pub fn log_export_start(operation: LogOperation, title: &str, message_count: usize) {
    tracing::info!(
        operation = operation.as_str(),
        title = title,
        message_count = message_count,
        "Starting export"
    );
}

/// Log export completion
pub fn log_export_result(operation: LogOperation, file_name: &str, bytes: usize) {
    tracing::info!(
        operation = operation.as_str(),
        file_name = file_name,
        size_bytes = bytes,
        "Export completed"
    );
}

/// Log an element that could not be produced during bulk export
pub fn log_element_skipped(message_uuid: &str, element: &str, reason: &str) {
    tracing::debug!(
        operation = LogOperation::GranularExport.as_str(),
        message_uuid = message_uuid,
        element = element,
        reason = reason,
        "Element skipped"
    );
}

/// Log a PDF fragment that fell back to plain text
pub fn log_pdf_fallback(message_index: usize, fragment: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::PdfExport.as_str(),
        message_index = message_index,
        fragment = fragment,
        error = error,
        "Fragment rendered as plain text"
    );
}

/// Log table of contents entries that did not fit the reserved pages
pub fn log_toc_overflow(written: usize, dropped: usize) {
    tracing::warn!(
        operation = LogOperation::PdfExport.as_str(),
        written = written,
        dropped = dropped,
        "Table of contents entries dropped"
    );
}

/// Log an unreadable overlay value that is about to be replaced
pub fn log_overlay_corrupt(key: &str, error: &str) {
    tracing::warn!(
        operation = LogOperation::Overlay.as_str(),
        key = key,
        error = error,
        "Corrupt overlay value replaced"
    );
}

/// Log overlay write
pub fn log_overlay_write(key: &str) {
    tracing::trace!(
        operation = LogOperation::Overlay.as_str(),
        key = key,
        "Overlay value written"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_operation_as_str() {
        assert_eq!(LogOperation::Normalize.as_str(), "normalize");
        assert_eq!(LogOperation::BranchDetection.as_str(), "branch_detection");
        assert_eq!(LogOperation::BranchSelection.as_str(), "branch_selection");
        assert_eq!(LogOperation::GranularExport.as_str(), "granular_export");
        assert_eq!(LogOperation::MarkdownExport.as_str(), "markdown_export");
        assert_eq!(LogOperation::PdfExport.as_str(), "pdf_export");
        assert_eq!(LogOperation::Overlay.as_str(), "overlay");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
