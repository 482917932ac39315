use crate::record::{AnalysisRecord, AnalysisStatus};

const PLACEHOLDER: &str = "Pending";

/// Render a principal's analysis history, newest first, as fixed-width
/// rows. Label and probability are only shown for successful analyses;
/// anything else gets the placeholder. Pure formatting: a store error on
/// the way here must be surfaced by the caller, never rendered as an
/// empty history.
pub fn render_history(records: &[AnalysisRecord]) -> String {
    if records.is_empty() {
        return "No analyses yet. Upload an X-ray image to get started.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!(
        "{:<6} {:<12} {:<10} {:<14} {:<13} NOTES\n",
        "ID", "DATE", "STATUS", "RESULT", "PROBABILITY"
    ));

    for record in records {
        out.push_str(&format_row(record));
        out.push('\n');
    }
    out
}

fn format_row(record: &AnalysisRecord) -> String {
    let (result, probability) = match record.status {
        AnalysisStatus::Success => (
            record.predicted_label.clone().unwrap_or_default(),
            record
                .confidence_score
                .map(|score| format!("{:.2}%", score * 100.0))
                .unwrap_or_default(),
        ),
        _ => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
    };

    let notes = match record.status {
        AnalysisStatus::Failed => record.failure_reason.clone().unwrap_or_default(),
        _ => String::new(),
    };

    format!(
        "{:<6} {:<12} {:<10} {:<14} {:<13} {}",
        record.id,
        record.created_at.format("%Y-%m-%d"),
        record.status,
        result,
        probability,
        notes
    )
    .trim_end()
    .to_string()
}
