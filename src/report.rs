use crate::record::{AnalysisRecord, AnalysisStatus};

/// A downloadable report artifact: deterministic name, deterministic
/// contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    pub filename: String,
    pub contents: String,
}

/// Render one record into its report. Pure and byte-deterministic: the
/// same record always yields the same document, the date format is fixed
/// rather than locale-ambient, and no store or network access happens
/// here.
pub fn render(record: &AnalysisRecord) -> ReportDocument {
    let label = match record.status {
        AnalysisStatus::Success => record.predicted_label.as_deref().unwrap_or("Pending"),
        _ => "Pending",
    };
    let probability = match (record.status, record.confidence_score) {
        (AnalysisStatus::Success, Some(score)) => format!("{:.2}%", score * 100.0),
        _ => "Pending".to_string(),
    };

    let mut contents = String::new();
    contents.push_str("Pneumonia Detection Report\n");
    contents.push('\n');
    contents.push_str(&format!("Date: {}\n", record.created_at.format("%Y-%m-%d")));
    contents.push_str(&format!("Analysis ID: {}\n", record.id));
    contents.push_str(&format!("Detection Result: {label}\n"));
    contents.push_str(&format!("Detection Probability: {probability}\n"));
    contents.push_str(&format!("Status: {}\n", record.status));

    ReportDocument {
        filename: format!("pneumonia-analysis-{}.txt", record.id),
        contents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn success_record() -> AnalysisRecord {
        AnalysisRecord {
            id: 42,
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap(),
            image_path: "uploads/scan.jpg".to_string(),
            status: AnalysisStatus::Success,
            predicted_label: Some("PNEUMONIA".to_string()),
            confidence_score: Some(0.93),
            failure_reason: None,
            result: None,
        }
    }

    #[test]
    fn test_report_layout() {
        let report = render(&success_record());
        assert_eq!(report.filename, "pneumonia-analysis-42.txt");

        let lines: Vec<&str> = report.contents.lines().collect();
        assert_eq!(lines[0], "Pneumonia Detection Report");
        assert_eq!(lines[2], "Date: 2024-03-15");
        assert_eq!(lines[3], "Analysis ID: 42");
        assert_eq!(lines[4], "Detection Result: PNEUMONIA");
        assert_eq!(lines[5], "Detection Probability: 93.00%");
        assert_eq!(lines[6], "Status: success");
    }

    #[test]
    fn test_render_is_deterministic() {
        let record = success_record();
        assert_eq!(render(&record), render(&record));
    }

    #[test]
    fn test_pending_record_uses_placeholders() {
        let mut record = success_record();
        record.status = AnalysisStatus::Pending;
        record.predicted_label = None;
        record.confidence_score = None;

        let report = render(&record);
        assert!(report.contents.contains("Detection Result: Pending"));
        assert!(report.contents.contains("Detection Probability: Pending"));
        assert!(report.contents.contains("Status: pending"));
    }

    #[test]
    fn test_failed_record_never_shows_scores() {
        let mut record = success_record();
        record.status = AnalysisStatus::Failed;
        record.predicted_label = None;
        record.confidence_score = None;
        record.failure_reason = Some("model unavailable".to_string());

        let report = render(&record);
        assert!(report.contents.contains("Detection Result: Pending"));
        assert!(report.contents.contains("Status: failed"));
        assert!(!report.contents.contains('%'));
    }
}
