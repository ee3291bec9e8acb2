pub mod builders;
pub mod fake_unit;

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// Uses `with_test_writer()`, so log output is captured per-test and only
/// printed for failing tests (unless you run with `-- --nocapture`).
///
/// The filter comes from `RUST_LOG` (the binary's `FANRUN_LOG` only applies
/// to `fanrun::logging`), e.g. `RUST_LOG=fanrun=debug cargo test`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
///
/// Dispatch tests block on completion aggregation; a bug there shows up as
/// a hang, and this turns the hang into a failure.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("test future did not finish within 5 seconds")
}
