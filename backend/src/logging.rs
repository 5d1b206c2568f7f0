use std::str::FromStr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber. A bare level such as `debug` gets quiet
/// defaults for the HTTP stack; full directive strings are used as given.
pub fn setup_logging(log_level: &str, json_format: bool) {
    let filter_directive = filter_directive(log_level);
    let filter = EnvFilter::from_str(&filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        let json_layer = fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(false);
        subscriber.with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer().with_target(true).compact();
        subscriber.with(fmt_layer).init();
    }

    tracing::info!(
        "Logging initialized ({}): {}",
        if json_format { "json" } else { "compact" },
        filter_directive
    );
}

fn filter_directive(log_level: &str) -> String {
    let normalized = log_level.trim();
    if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!(
            "{},h2=info,hyper=info,hyper_util=info,reqwest=info,alloy_transport_http=info",
            normalized
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_gets_quiet_http_defaults() {
        let directive = filter_directive(" debug ");
        assert!(directive.starts_with("debug,"));
        assert!(directive.contains("reqwest=info"));
    }

    #[test]
    fn test_directives_are_kept() {
        assert_eq!(filter_directive("euclid_swap_backend=trace"), "euclid_swap_backend=trace");
    }
}
