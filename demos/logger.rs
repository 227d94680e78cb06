use rollog::{Config, Cycle, Level, Logger};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logger = Logger::new(&Config {
        name: "demo".to_string(),
        level: Level::Info,
        path: "./logs/logger.log".to_string(),
        rotate_bytes: 256 * 1024,
        rotate_cycle: Cycle::Daily,
        ..Config::default()
    })?;

    rollog::debug!(logger, "This is a debug message, filtered out");
    rollog::info!(logger, "This is an info message");
    rollog::warn!(logger, "This is a warning message");
    rollog::error!(logger, "This is an error message");
    logger.error_stack(format_args!("This is an error message with a stack trace"));

    logger.close()?;
    Ok(())
}
