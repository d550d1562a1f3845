use std::io::Write;

/// Initialise env_logger for the binary and tests.
///
/// `RUST_LOG` controls the level and defaults to `info`. Calling this more than once is
/// harmless, later calls are ignored.
pub fn log_init() {
    let env = env_logger::Env::default().default_filter_or("info");
    let _ = env_logger::Builder::from_env(env)
        .target(env_logger::Target::Stdout)
        .format(|buf, record| writeln!(buf, "{}: {}", record.level(), record.args()))
        .try_init();
}
