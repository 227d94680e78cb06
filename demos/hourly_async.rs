use {
    rollog::{Config, Cycle, Level, Logger},
    std::{sync::Arc, thread},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("LOG_DIR").is_none() {
        std::env::set_var("LOG_DIR", "./logs");
    }
    let logger = Arc::new(Logger::new(&Config {
        name: "worker".to_string(),
        level: Level::Debug,
        path: "${LOG_DIR}/hourly.log".to_string(),
        rotate_cycle: Cycle::Hourly,
        async_write: true,
        async_queue_size: 128, // Callers wait once 128 records are queued
        ..Config::default()
    })?);

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..1000 {
                    rollog::info!(logger, "worker {n} finished job {i}");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().map_err(|_| "worker panicked")?;
    }

    // Waits for queued records before closing the file
    logger.close()?;
    Ok(())
}
