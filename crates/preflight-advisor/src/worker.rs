//! Background processing of captured queries

use std::sync::Arc;

use chrono::{DateTime, Utc};
use preflight_analyzer::Priority;
use preflight_core::BoundQuery;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::advisor::Advisor;
use crate::error::AdvisorResult;
use crate::result::AnalysisResult;

/// One examined query and its outcome
#[derive(Debug)]
pub struct AnalysisReport {
    pub query: BoundQuery,
    pub result: AdvisorResult<AnalysisResult>,
    pub analyzed_at: DateTime<Utc>,
}

/// Receives every [`AnalysisReport`] produced by an [`AdvisorWorker`]
pub trait ReportHandler: Send + Sync + 'static {
    fn handle(&self, report: AnalysisReport);
}

impl<F> ReportHandler for F
where
    F: Fn(AnalysisReport) + Send + Sync + 'static,
{
    fn handle(&self, report: AnalysisReport) {
        self(report)
    }
}

/// Drains captured queries from a channel and examines them one at a time
///
/// Pair with [`preflight_capture::ChannelSink`]: the capture layer never
/// waits on the advisor, and a full channel drops captures instead.
pub struct AdvisorWorker {
    advisor: Arc<dyn Advisor>,
    handler: Arc<dyn ReportHandler>,
}

impl AdvisorWorker {
    pub fn new(advisor: Arc<dyn Advisor>, handler: impl ReportHandler) -> Self {
        Self {
            advisor,
            handler: Arc::new(handler),
        }
    }

    /// Examine one query and hand the report to the handler
    pub async fn process(&self, query: BoundQuery) {
        let result = self.advisor.examine(&query).await;
        match &result {
            Ok(analysis) => tracing::debug!(
                highest_priority = ?analysis.highest_priority(),
                urgent = analysis.at_least(Priority::High).count(),
                ddl = analysis.ddl().count(),
                sql_preview = %preview(query.sql()),
                "preflight analysis finished"
            ),
            Err(e) => {
                tracing::warn!(error = %e, sql_preview = %preview(query.sql()), "preflight analysis failed")
            }
        }
        self.handler.handle(AnalysisReport {
            query,
            result,
            analyzed_at: Utc::now(),
        });
    }

    /// Process queries until every sender is dropped
    ///
    /// Returns the number of queries processed.
    pub async fn run(self, mut receiver: mpsc::Receiver<BoundQuery>) -> usize {
        tracing::debug!("advisor worker started");
        let mut processed = 0;
        while let Some(query) = receiver.recv().await {
            self.process(query).await;
            processed += 1;
        }
        tracing::debug!(processed, "advisor worker stopped");
        processed
    }

    /// Run on a new tokio task
    pub fn spawn(self, receiver: mpsc::Receiver<BoundQuery>) -> JoinHandle<usize> {
        tokio::spawn(self.run(receiver))
    }
}

impl std::fmt::Debug for AdvisorWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorWorker").finish_non_exhaustive()
    }
}

fn preview(sql: &str) -> String {
    sql.chars().take(100).collect()
}

#[cfg(test)]
mod tests;
