//! Tracing initialization for the binary.
//!
//! Diagnostics go to stderr so stdout stays clean for command output
//! (`plan --json` in particular). `RUST_LOG` wins over the verbosity flags.

/// Filter directive for a `-v`/`-q` balance.
///
/// Zero is the default (`warn`); each `-v` adds a level, `-q` drops to errors.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the tracing subscriber at the level chosen on the command line.
pub fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_for(verbose, quiet)));

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}
