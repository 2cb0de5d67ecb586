//! Opt-in diagnostics for the backend's `scour::*` tracing targets.
//!
//! The crate only emits events; nothing is printed unless a host installs a
//! subscriber or asks for the bundled one through `SCOUR_TRACE`.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACE_INIT: Once = Once::new();

/// Cache transitions, concat plans and closure synthesis; catalog interning
/// only at info.
pub const DEFAULT_TRACE_FILTER: &str =
    "scour::codegen=debug,scour::dispatch=debug,scour::concat=debug,scour::lambda=debug,scour::catalog=info";

/// What a `SCOUR_TRACE` value asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceRequest {
    Off,
    /// `1`, `true` or `on`: the default filter, or `RUST_LOG` when set.
    Default,
    /// Anything else is taken as a filter expression.
    Filter(String),
}

impl TraceRequest {
    pub fn parse(raw: &str) -> TraceRequest {
        let trimmed = raw.trim();
        if !env_toggle_enabled(trimmed) {
            TraceRequest::Off
        } else if ["1", "true", "on"].iter().any(|v| trimmed.eq_ignore_ascii_case(v)) {
            TraceRequest::Default
        } else {
            TraceRequest::Filter(trimmed.to_string())
        }
    }

    /// Filter expression to install; invalid expressions fall back to the
    /// default.
    pub fn filter(&self, rust_log: Option<&str>) -> Option<String> {
        let chosen = match self {
            TraceRequest::Off => return None,
            TraceRequest::Default => rust_log.map(str::to_string),
            TraceRequest::Filter(expr) => Some(expr.clone()),
        };
        Some(
            chosen
                .filter(|expr| EnvFilter::try_new(expr).is_ok())
                .unwrap_or_else(|| DEFAULT_TRACE_FILTER.to_string()),
        )
    }
}

/// Empty, `0`, `false` and `off` (any case) turn a toggle off.
pub(crate) fn env_toggle_enabled(raw: &str) -> bool {
    let trimmed = raw.trim();
    !(trimmed.is_empty() || ["0", "false", "off"].iter().any(|v| trimmed.eq_ignore_ascii_case(v)))
}

/// Installs a stderr subscriber for `request`, at most once per process.
/// Returns whether this call installed it; a subscriber the host already set
/// wins.
pub fn init_tracing(request: &TraceRequest) -> bool {
    let rust_log = std::env::var("RUST_LOG").ok();
    let Some(filter) = request.filter(rust_log.as_deref()) else {
        return false;
    };
    let mut installed = false;
    TRACE_INIT.call_once(|| {
        installed = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(EnvFilter::new(filter))
            .try_init()
            .is_ok();
    });
    installed
}

/// [`init_tracing`] driven by `SCOUR_TRACE`; does nothing when it is unset.
pub fn maybe_init_tracing() -> bool {
    match std::env::var("SCOUR_TRACE") {
        Ok(raw) => init_tracing(&TraceRequest::parse(&raw)),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_values() {
        assert!(env_toggle_enabled("1"));
        assert!(env_toggle_enabled("scour::dispatch=trace"));
        assert!(!env_toggle_enabled(" off "));
        assert!(!env_toggle_enabled(""));
    }

    #[test]
    fn requests_from_env_values() {
        assert_eq!(TraceRequest::parse("FALSE"), TraceRequest::Off);
        assert_eq!(TraceRequest::parse(" on "), TraceRequest::Default);
        assert_eq!(
            TraceRequest::parse("scour::concat=trace"),
            TraceRequest::Filter("scour::concat=trace".into())
        );
    }

    #[test]
    fn filter_selection() {
        assert_eq!(TraceRequest::Off.filter(Some("info")), None);
        assert_eq!(TraceRequest::Default.filter(None).as_deref(), Some(DEFAULT_TRACE_FILTER));
        assert_eq!(TraceRequest::Default.filter(Some("warn")).as_deref(), Some("warn"));
        let bad = TraceRequest::Filter("scour=loud".into());
        assert_eq!(bad.filter(None).as_deref(), Some(DEFAULT_TRACE_FILTER));
    }

    #[test]
    fn off_installs_nothing() {
        assert!(!init_tracing(&TraceRequest::Off));
    }
}
