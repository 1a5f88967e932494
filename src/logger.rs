//! stderr logging setup

use env_logger::{Builder, Target};
use log::LevelFilter;
use std::io::Write;

/// Log level selected by the number of `-v` flags.
pub fn level_for_verbosity(count: u8) -> LevelFilter {
    match count {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger. `RUST_LOG` is honored unless `-v` was given, in which
/// case the flag count decides the level.
pub fn init(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = Builder::new();
    builder.filter_level(LevelFilter::Warn).parse_default_env();
    if verbosity > 0 {
        builder.filter_level(level_for_verbosity(verbosity));
    }

    builder
        .target(Target::Stderr)
        .format(|buf, record| {
            let (level_color, reset) = match record.level() {
                log::Level::Error => ("\x1b[31m", "\x1b[0m"),
                log::Level::Warn => ("\x1b[33m", "\x1b[0m"),
                log::Level::Info => ("\x1b[32m", "\x1b[0m"),
                log::Level::Debug => ("\x1b[36m", "\x1b[0m"),
                log::Level::Trace => ("\x1b[35m", "\x1b[0m"),
            };

            writeln!(
                buf,
                "{}{:>5}{} \x1b[94m[{}]\x1b[0m {}",
                level_color,
                record.level(),
                reset,
                record.module_path().unwrap_or("rupe"),
                record.args()
            )
        });

    builder.try_init()
}
