//! Tracing setup for Folio binaries.
//!
//! [`init`] installs a `tracing-subscriber` registry with an [`EnvFilter`]
//! (default `info`, overridden by `RUST_LOG`) and a formatter on stderr.
//!
//! # OpenTelemetry
//!
//! Built with the `telemetry` feature, an OTLP export layer is added when the
//! standard OTel environment variables ask for it:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 folio list
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{otel_layer, OtelGuard};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps exporters alive; drop it last in `main`.
#[must_use = "dropping the guard stops span export"]
#[derive(Default)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    _otel: Option<OtelGuard>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard").finish_non_exhaustive()
    }
}

/// Check whether OTel export should be enabled.
///
/// Returns `true` when standard OTel env vars indicate export is desired:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
pub fn otel_enabled() -> bool {
    if std::env::var("OTEL_SDK_DISABLED")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return false;
    }

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        return true;
    }

    if let Ok(exporter) = std::env::var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}

/// Filter from `RUST_LOG`, or `default_directive` when unset or invalid.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber at `info`.
pub fn init(service_name: &str) -> TelemetryGuard {
    init_with(service_name, "info")
}

/// Install the global subscriber with a default filter directive.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_with(service_name: &str, default_directive: &str) -> TelemetryGuard {
    let registry = tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt::layer().with_writer(std::io::stderr));

    #[cfg(feature = "telemetry")]
    if otel_enabled() {
        match otel::otel_layer(service_name) {
            Ok((layer, guard)) => {
                let _ = registry.with(layer).try_init();
                return TelemetryGuard { _otel: Some(guard) };
            }
            Err(e) => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter(default_directive))
                    .with(fmt::layer().with_writer(std::io::stderr))
                    .try_init();
                tracing::warn!(service = service_name, error = %e, "OTLP export unavailable");
                return TelemetryGuard::default();
            }
        }
    }

    let _ = registry.try_init();
    tracing::debug!(service = service_name, "tracing initialised");
    TelemetryGuard::default()
}
