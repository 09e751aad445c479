//! Thin wrapper around `env_logger` for binaries/tests that want console
//! output. Library code never calls this itself; it only ever logs through
//! the `log` facade macros.

use env_logger::Builder;
use std::io::Write;
use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the process-wide logger. Idempotent: safe to call from every
/// test that needs log output without double-initializing.
pub fn init() {
    INIT.call_once(|| {
        let mut builder = Builder::from_default_env();
        builder
            .format_timestamp_micros()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {}] [{}:{}] {}",
                    record.level(),
                    record.target(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            })
            .init();
    });
}
