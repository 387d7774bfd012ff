pub mod ga4;
pub mod report;

pub use ga4::Ga4Client;
pub use report::{AnalyticsSummary, ReportRow, ReportValue, RunReportResponse};

/// Source of the weekly traffic report.
#[async_trait::async_trait]
pub trait AnalyticsSource: Send + Sync {
    async fn run_report(&self) -> anyhow::Result<RunReportResponse>;
}
