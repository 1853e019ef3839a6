//! Shared helpers for sitepipe's integration tests: scripted tools, a fake
//! executor, graph/config/site builders and tracing setup.

pub mod builders;
pub mod fake_executor;
pub mod tools;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use sitepipe::logging::LOG_ENV_VAR;
use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Upper bound for any single awaited step in a test.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Install a test-captured tracing subscriber once per test binary.
///
/// The filter comes from `SITEPIPE_LOG` (same syntax as `RUST_LOG`) and
/// defaults to `info`. Output is only shown for failing tests unless the
/// harness runs with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Await `f`, panicking after [`TEST_TIMEOUT`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test step timed out")
}
