//! Tracing setup for the session layer
//!
//! In the browser events go to the devtools console; natively (tests, tools)
//! they go to stderr.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber at `level`
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(level: LevelFilter) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt_layer())
        .with(level)
        .try_init()
}

#[cfg(target_arch = "wasm32")]
fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    // Console has its own timestamps and no ANSI support
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .without_time()
        .with_target(true)
        .with_writer(tracing_web::MakeWebConsoleWriter::new())
}

#[cfg(not(target_arch = "wasm32"))]
fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr)
}
