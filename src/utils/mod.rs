//! Utility functions shared by the library and the binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable that switches the default log level to debug.
pub const DEBUG_ENV: &str = "OCR_DEBUG";

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Without it, `OCR_DEBUG=1` enables debug output
/// for this crate; otherwise the default is info.
pub fn init_tracing() {
    let debug = std::env::var(DEBUG_ENV).is_ok_and(|v| v == "1");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    // Already initialized (tests, repeated CLI calls).
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn default_directives(debug: bool) -> &'static str {
    if debug {
        "ocr_gateway=debug,tower_http=debug,info"
    } else {
        "ocr_gateway=info,tower_http=info,warn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert!(default_directives(true).starts_with("ocr_gateway=debug"));
        assert!(default_directives(false).starts_with("ocr_gateway=info"));
    }
}
