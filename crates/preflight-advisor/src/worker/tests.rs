use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use preflight_analyzer::{Plan, PlanNode, PreflightEstimator, PlannerSettings};
use preflight_capture::{ChannelSink, QuerySink};
use pretty_assertions::assert_eq;

use crate::error::AdvisorError;

/// Succeeds for every statement except those mentioning `broken`
struct MockAdvisor;

#[async_trait]
impl Advisor for MockAdvisor {
    async fn examine(&self, query: &BoundQuery) -> AdvisorResult<AnalysisResult> {
        if query.sql().contains("broken") {
            return Err(AdvisorError::ExplainExecution("relation \"broken\" does not exist".into()));
        }
        let plan = Plan::new(PlanNode::new("Result").with_cost(1.5));
        let estimates = PreflightEstimator::default().estimate(&plan, &PlannerSettings::default(), query.sql());
        Ok(AnalysisResult {
            plan_cost: plan.total_cost,
            plan,
            estimates,
            recommendations: Vec::new(),
        })
    }
}

fn collecting_worker() -> (AdvisorWorker, Arc<Mutex<Vec<AnalysisReport>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    let worker = AdvisorWorker::new(Arc::new(MockAdvisor), move |report: AnalysisReport| {
        sink.lock().push(report);
    });
    (worker, reports)
}

#[tokio::test]
async fn test_process_reports_success_and_failure() {
    let (worker, reports) = collecting_worker();

    worker.process(BoundQuery::new("SELECT 1", Vec::new())).await;
    worker.process(BoundQuery::new("SELECT * FROM broken", Vec::new())).await;

    let reports = reports.lock();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].query.sql(), "SELECT 1");
    assert_eq!(reports[0].result.as_ref().map(|r| r.plan_cost).ok(), Some(1.5));
    assert!(matches!(
        reports[1].result,
        Err(AdvisorError::ExplainExecution(_))
    ));
}

#[tokio::test]
async fn test_worker_drains_channel_until_closed() {
    let (worker, reports) = collecting_worker();
    let (sink, receiver) = ChannelSink::bounded(8);
    let handle = worker.spawn(receiver);

    for sql in ["SELECT 1", "SELECT * FROM broken", "SELECT 2"] {
        sink.deliver(BoundQuery::new(sql, Vec::new())).unwrap();
    }
    drop(sink);

    let processed = handle.await.unwrap();
    assert_eq!(processed, 3);

    let reports = reports.lock();
    let sqls: Vec<&str> = reports.iter().map(|r| r.query.sql()).collect();
    assert_eq!(sqls, vec!["SELECT 1", "SELECT * FROM broken", "SELECT 2"]);
    assert_eq!(reports.iter().filter(|r| r.result.is_ok()).count(), 2);
}

#[test]
fn test_preview_truncates_long_sql() {
    let sql = "x".repeat(250);
    assert_eq!(preview(&sql).len(), 100);
    assert_eq!(preview("SELECT 1"), "SELECT 1");
}
