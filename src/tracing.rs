//! Log setup for the server binary and tests.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `rustdoc_search=trace`.
pub const LOG_ENV: &str = "RUSTDOC_SEARCH_LOG";

/// Set to `json` for one JSON object per event.
pub const LOG_FORMAT_ENV: &str = "RUSTDOC_SEARCH_LOG_FORMAT";

static INIT: Once = Once::new();

/// Install the global subscriber. Later calls do nothing.
///
/// Events go to stderr; stdout belongs to the MCP transport.
pub fn init() {
    INIT.call_once(|| {
        let under_test =
            std::env::var("NEXTEST").is_ok() || std::env::var("CARGO_TARGET_TMPDIR").is_ok();
        let fallback = if under_test {
            "rustdoc_search=debug"
        } else {
            "rustdoc_search=info,rmcp=warn"
        };
        let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
        let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));

        let installed = if under_test {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .compact()
                .try_init()
        } else if json {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .compact()
                .try_init()
        };

        if let Err(e) = installed {
            eprintln!("rustdoc-search: failed to initialize tracing: {}", e);
        }
    });
}
