/*! Integration tests for Mirrordoc.
 *
 * This test suite is organized as a single integration test binary
 * following the pattern described by matklad in
 * https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html
 *
 * The module structure mirrors the main library structure:
 * - store: Tests for the InMemory document store through the public API
 * - dispatch: Tests for the WriteDispatcher ordering, results and failures
 * - mirror: Tests for mirrored maps and sequences, organized by topic
 * - config: Tests for MirrorConfig loading and how roots apply it
 */

use tracing_subscriber::EnvFilter;

#[ctor::ctor]
fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("mirrordoc=info".parse().unwrap()),
        )
        .with_test_writer()
        .try_init();
}

mod config;
mod dispatch;
mod mirror;
mod store;
