//! Logging setup for apex-lsq binaries and tests.
//!
//! Solver diagnostics go through `tracing`: trial decisions at DEBUG, the
//! verbose iteration table and summaries at INFO, failures at ERROR. This
//! module installs a subscriber that prints them in a compact bracketed format.

use tracing::Level;

/// Initialize the global subscriber at INFO.
///
/// The level can be overridden through `RUST_LOG`:
/// ```bash
/// RUST_LOG=debug cargo run --bin synthetic_pose -- --optimizer lm
/// RUST_LOG=apex_lsq=trace cargo run --bin synthetic_pose
/// ```
///
/// Format: `[LEVEL YYYY-MM-DD HH:MM:SS module]` for INFO/WARN/ERROR,
/// `[LEVEL YYYY-MM-DD HH:MM:SS file:line]` for DEBUG/TRACE.
///
/// ```no_run
/// apex_lsq::init_logger();
/// tracing::info!("ready");
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the global subscriber with a custom default level.
///
/// Calling it again once a subscriber is installed is a no-op, so tests can
/// call it freely.
pub fn init_logger_with_level(default_level: Level) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .event_format(BracketFormatter)
        .try_init();

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed, keeping it");
    }
}

/// `[LEVEL timestamp location] message`
struct BracketFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        let colored = match level {
            Level::ERROR => "\x1b[31mERROR\x1b[0m",
            Level::WARN => "\x1b[33mWARN\x1b[0m",
            Level::INFO => "\x1b[32mINFO\x1b[0m",
            Level::DEBUG => "\x1b[34mDEBUG\x1b[0m",
            Level::TRACE => "\x1b[35mTRACE\x1b[0m",
        };
        write!(
            writer,
            "[{} {} ",
            colored,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        )?;

        match (level >= Level::DEBUG, metadata.file()) {
            // DEBUG and TRACE compare greater than INFO in tracing's ordering
            (true, Some(file)) => {
                let filename = file.rsplit('/').next().unwrap_or(file);
                write!(writer, "{filename}")?;
                if let Some(line) = metadata.line() {
                    write!(writer, ":{line}")?;
                }
            }
            _ => write!(writer, "{}", metadata.target())?,
        }

        write!(writer, "] ")?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
