//! Tracing and diagnostics setup for binaries and demos.
//!
//! Library code only emits `tracing` events; installing a subscriber is the
//! application's call. [`init`] wires the conventional stack: env-filtered
//! fmt output plus span-trace capture for miette reports.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default subscriber. Call once, before the engine runs.
///
/// `RUST_LOG` overrides the default `error,briefweave=info` filter.
pub fn init() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("error,briefweave=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

/// Pretty panic reports via miette.
pub fn init_panic_hook() {
    miette::set_panic_hook();
}
