use env_logger::{Builder, Env};
use std::io::Write;

/// Installs the process logger. `RUST_LOG` overrides the default `info` filter.
pub fn init() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(
            buf,
            "[{} {style}{:<5}{style:#} {}] {}",
            buf.timestamp_millis(),
            record.level(),
            record.target(),
            record.args()
        )
    });
    // A second init (tests, embedding) keeps the first logger.
    let _ = builder.try_init();
}
