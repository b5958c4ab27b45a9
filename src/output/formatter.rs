use super::FileReport;

/// Renders a batch of per-file analysis reports.
pub trait OutputFormatter: Send + Sync {
    fn format_reports(&self, reports: &[FileReport]) -> String;

    fn format_report(&self, report: &FileReport) -> String {
        self.format_reports(std::slice::from_ref(report))
    }
}
