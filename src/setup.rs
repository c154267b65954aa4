//! Process-wide error reporting and logging, installed once by the host.

use color_eyre::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

pub fn setup(log_level: &str) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", log_level)
    }
    setup_logging(parse_level(log_level));
    Ok(())
}

pub fn setup_logging(level: Level) {
    let result = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .try_init();
    if let Err(e) = result {
        // a host or test harness installed its own subscriber first
        tracing::debug!("Logging already initialised: {}", e);
    }
}

pub fn parse_level(level: &str) -> Level {
    level.parse().unwrap_or(Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_levels_fall_back_to_info() {
        assert_eq!(parse_level("debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("chatty"), Level::INFO);
    }

    #[test]
    fn logging_can_be_initialised_twice() {
        setup_logging(Level::DEBUG);
        setup_logging(Level::INFO);
    }
}
