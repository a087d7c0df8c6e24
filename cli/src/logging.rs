use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE: &str = "shopdb.log";

/// stderr always; `<log_dir>/shopdb.log` as well when a log directory is configured.
/// Level comes from `RUST_LOG`, default `info`.
pub fn init(log_dir: Option<&Path>) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	let file_layer = log_dir.and_then(|dir| {
		std::fs::create_dir_all(dir).ok()?;
		let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
		Some(fmt::layer().with_ansi(false).with_writer(file_appender))
	});

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_target(false).with_writer(std::io::stderr))
		.with(file_layer)
		.init();
}
