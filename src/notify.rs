use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::pipeline::RunReport;
use crate::types::Result;

/// Posts the end-of-run summary to a Slack incoming webhook. Without a
/// configured webhook every call is a silent no-op.
pub struct SlackNotifier {
    webhook_url: Option<String>,
    http: Client,
}

impl SlackNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        Self {
            webhook_url,
            http: Client::new(),
        }
    }

    pub async fn notify_run(&self, report: &RunReport) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            debug!("Slack disabled (no webhook configured)");
            return Ok(());
        };

        let text = format!(
            "Pipeline run `{}` finished: {} fetched, {} deduplicated, {} selected, \
             {} summarized, {} insights, {} embedded, {} inserted / {} updated, {} failures",
            report.run_id,
            report.fetched,
            report.deduplicated,
            report.selected,
            report.summarized,
            report.insights,
            report.embedded,
            report.persisted.inserted,
            report.persisted.updated,
            report.failures
        );

        self.http
            .post(url)
            .json(&json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
