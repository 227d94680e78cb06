use rollog::{Config, Level, SyncWriter, Writer};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let writer = SyncWriter::open(&Config {
        path: "./logs/sized.log".to_string(),
        rotate_bytes: 1024 * 1024, // Rotate before passing 1MB
        file_mode: Some(0o640),    // Owner rw, group r, others none
        ..Config::default()
    })?;

    // Simulate writing logs that will trigger size-based rotation
    for i in 1..=20_000 {
        writer.log(
            Level::Info,
            None,
            format_args!("Log entry #{i}: This is a sample log message that will contribute to file size"),
        )?;
    }
    println!("rotated {} times", writer.rotations());

    writer.close()?;
    Ok(())
}
