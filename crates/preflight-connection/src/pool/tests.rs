use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use preflight_core::{
    Connection, PreflightError, PreparedStatement, QueryResult, Result, StatementResult, Value,
};

use super::config::PoolConfig;
use super::pool::{ConnectionFactory, ConnectionPool};
use super::stats::PoolStats;

/// An EXPLAIN connection that only tracks whether it was closed
#[derive(Default)]
struct ExplainConn {
    closed: AtomicBool,
}

#[async_trait]
impl Connection for ExplainConn {
    fn driver_name(&self) -> &str {
        "explain-stub"
    }

    async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
        Ok(StatementResult::command(0))
    }

    async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
        Ok(QueryResult::empty())
    }

    async fn prepare(&self, _sql: &str) -> Result<Box<dyn PreparedStatement>> {
        Err(PreflightError::NotSupported("stub connection".into()))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Counts opened connections; `refuse` makes every open fail
#[derive(Default)]
struct Opener {
    opened: AtomicUsize,
    refuse: bool,
}

impl Opener {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for Opener {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        if self.refuse {
            return Err(PreflightError::Connection("server refused connection".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ExplainConn::default()))
    }
}

fn pool_of(config: PoolConfig) -> (ConnectionPool, Arc<Opener>) {
    let opener = Arc::new(Opener::default());
    let pool = ConnectionPool::new(config, Arc::clone(&opener)).expect("valid config");
    (pool, opener)
}

mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pool_table_from_toml() {
        let config: PoolConfig = toml::from_str(
            r#"
min_size = 0
max_size = 2
acquire_timeout_ms = 500
"#,
        )
        .expect("valid pool table");

        assert_eq!(config, PoolConfig::new(0, 2).with_acquire_timeout(Duration::from_millis(500)));
        assert_eq!(config.idle_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_sizes_are_validated() {
        assert!(PoolConfig::default().validate().is_ok());

        let err = PoolConfig::new(0, 0).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: explain pool needs max_size of at least 1"
        );

        let err = PoolConfig::new(3, 2).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: explain pool min_size 3 is above max_size 2"
        );
        assert!(matches!(
            ConnectionPool::new(PoolConfig::new(3, 2), Opener::default()),
            Err(PreflightError::Configuration(_))
        ));
    }
}

mod pool_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_returned_connection_is_reused() {
        let (pool, opener) = pool_of(PoolConfig::new(0, 2));

        let conn = pool.get().await.expect("first explain");
        assert_eq!(conn.driver_name(), "explain-stub");
        assert_eq!(pool.stats(), PoolStats { idle: 0, active: 1, waiting: 0 });
        drop(conn);
        assert_eq!(pool.stats(), PoolStats { idle: 1, active: 0, waiting: 0 });

        let _again = pool.get().await.expect("second explain");
        assert_eq!(opener.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_pool_times_out() {
        let (pool, _) =
            pool_of(PoolConfig::new(0, 1).with_acquire_timeout(Duration::from_millis(50)));

        let _held = pool.get().await.expect("only slot");
        let err = pool.get().await.err().expect("no free slot");
        assert!(matches!(err, PreflightError::Timeout(_)));
        assert_eq!(pool.stats().waiting, 0);
    }

    #[tokio::test]
    async fn test_waiter_gets_slot_when_returned() {
        let (pool, opener) = pool_of(PoolConfig::new(0, 1));
        let held = pool.get().await.expect("only slot");

        let (conn, ()) = tokio::join!(pool.get(), async move {
            tokio::task::yield_now().await;
            drop(held);
        });
        assert!(conn.is_ok());
        assert_eq!(opener.opened(), 1);
    }

    #[tokio::test]
    async fn test_refused_open_leaves_counters_clean() {
        let pool = ConnectionPool::new(PoolConfig::new(0, 2), Opener::refusing())
            .expect("valid config");

        let err = pool.get().await.err().expect("open refused");
        assert!(matches!(err, PreflightError::Connection(_)));
        assert_eq!(pool.stats(), PoolStats::default());
    }

    #[tokio::test]
    async fn test_warm_up_opens_min_size_once() {
        let (pool, opener) = pool_of(PoolConfig::new(2, 4));

        assert_eq!(pool.warm_up().await.expect("warm up"), 2);
        assert_eq!(pool.warm_up().await.expect("already warm"), 0);
        assert_eq!(pool.stats().idle, 2);
        assert_eq!(opener.opened(), 2);
    }

    #[tokio::test]
    async fn test_closed_connection_is_not_parked() {
        let (pool, opener) = pool_of(PoolConfig::new(0, 2));
        {
            let conn = pool.get().await.expect("get");
            conn.close().await.expect("close");
        }
        assert_eq!(pool.stats().idle, 0);

        let _fresh = pool.get().await.expect("get");
        assert_eq!(opener.opened(), 2);
    }

    #[tokio::test]
    async fn test_stale_parked_connection_is_replaced() {
        let mut config = PoolConfig::new(1, 1);
        config.idle_timeout_ms = 0;
        let (pool, opener) = pool_of(config);
        pool.warm_up().await.expect("warm up");
        std::thread::sleep(Duration::from_millis(2));

        let _conn = pool.get().await.expect("get");
        assert_eq!(opener.opened(), 2);
    }

    #[tokio::test]
    async fn test_close_idle_drains_parked() {
        let (pool, _) = pool_of(PoolConfig::new(2, 2));
        pool.warm_up().await.expect("warm up");

        pool.close_idle().await;
        assert_eq!(pool.stats().idle, 0);
    }
}
