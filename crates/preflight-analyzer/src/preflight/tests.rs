use super::*;
use crate::explain::{PlanNode, parse_explain_json};

mod lock_level_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dml_takes_row_exclusive() {
        assert_eq!(infer_lock_level("UPDATE users SET a = 1"), LockLevel::RowExclusive);
        assert_eq!(infer_lock_level("  delete from users"), LockLevel::RowExclusive);
        assert_eq!(infer_lock_level("\nInsert into t values (1)"), LockLevel::RowExclusive);
    }

    #[test]
    fn test_select_for_update_takes_row_share() {
        assert_eq!(
            infer_lock_level("SELECT * FROM t WHERE id = 1 FOR UPDATE"),
            LockLevel::RowShare
        );
    }

    #[test]
    fn test_everything_else_is_access_share() {
        assert_eq!(infer_lock_level("select 1"), LockLevel::AccessShare);
        assert_eq!(infer_lock_level("WITH x AS (SELECT 1) SELECT * FROM x"), LockLevel::AccessShare);
        assert_eq!(infer_lock_level(""), LockLevel::AccessShare);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(LockLevel::AccessShare.to_string(), "ACCESS SHARE");
        assert_eq!(LockLevel::RowShare.to_string(), "ROW SHARE");
        assert_eq!(LockLevel::RowExclusive.to_string(), "ROW EXCLUSIVE");
        assert_eq!(LockLevel::AccessExclusive.to_string(), "ACCESS EXCLUSIVE");
    }
}

mod estimator_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_seq_scan_estimates() {
        let plan = parse_explain_json(
            r#"[{"Plan": {"Node Type": "Seq Scan", "Relation Name": "users",
                 "Plan Rows": 6000000, "Plan Width": 8, "Total Cost": 109229.5}}]"#,
        )
        .expect("parse failed");

        let estimates =
            PreflightEstimator::default().estimate(&plan, &PlannerSettings::default(), "SELECT * FROM users");

        assert_eq!(
            estimates,
            PreflightEstimates {
                expected_time_ms: 109229,
                scanned_bytes: 48_000_000,
                estimated_pages_read: 5859,
                memory_peak_bytes: 0,
                parallel_planned: false,
                lock_level: LockLevel::AccessShare,
            }
        );
    }

    #[test]
    fn test_sort_hash_and_gather() {
        let plan = Plan::new(
            PlanNode::new("Gather")
                .with_child(PlanNode::new("Sort").with_rows(1000.0).with_width(10))
                .with_child(PlanNode::new("Hash").with_rows(100.0).with_width(10)),
        );

        let estimates = PreflightEstimator::default().estimate(&plan, &PlannerSettings::default(), "select 1");

        assert_eq!(estimates.memory_peak_bytes, 20_000 + 1_500);
        assert!(estimates.parallel_planned);
        assert_eq!(estimates.scanned_bytes, 0);
    }

    #[test]
    fn test_width_zero_counts_as_one() {
        let plan = Plan::new(PlanNode::new("Index Scan").with_rows(100.0));
        let estimates = PreflightEstimator::default().estimate(&plan, &PlannerSettings::default(), "select 1");
        assert_eq!(estimates.scanned_bytes, 100);
    }

    #[test]
    fn test_cost_model_is_floored_at_zero() {
        let plan = Plan::new(PlanNode::new("Result").with_cost(10.0));
        let estimator = PreflightEstimator::new(8192, CostModel::new(0.5, -100.0));
        let estimates = estimator.estimate(&plan, &PlannerSettings::default(), "select 1");
        assert_eq!(estimates.expected_time_ms, 0);

        let estimator = PreflightEstimator::new(8192, CostModel::new(2.0, 3.0));
        let estimates = estimator.estimate(&plan, &PlannerSettings::default(), "select 1");
        assert_eq!(estimates.expected_time_ms, 23);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let plan = Plan::new(
            PlanNode::new("Hash Join")
                .with_cost(77.7)
                .with_child(PlanNode::new("Seq Scan").with_rows(5000.0).with_width(40))
                .with_child(PlanNode::new("Hash").with_rows(300.0).with_width(12)),
        );
        let estimator = PreflightEstimator::default();
        let settings = PlannerSettings::default();
        let first = estimator.estimate(&plan, &settings, "select * from a join b using (id)");
        let second = estimator.estimate(&plan, &settings, "select * from a join b using (id)");
        assert_eq!(first, second);
    }
}
