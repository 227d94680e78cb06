use rollog::{Registry, Settings};

const SETTINGS: &str = r#"{
    "flushPeriod": 1000,
    "level": "info",
    "path": "./logs/app.log",
    "rotateCycle": "daily",
    "exts": {
        "access,http": { "path": "./logs/access.log", "rotateBytes": 10485760, "async": true },
        "audit": { "path": "stderr", "level": "warn" }
    }
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut registry = Registry::from_settings(Settings::from_json_str(SETTINGS)?)?;

    if let Some(logger) = registry.default_logger() {
        rollog::info!(logger, "Application started");
    }
    if let Some(access) = registry.get("http") {
        rollog::info!(access, "GET /index.html 200");
    }
    if let Some(audit) = registry.get("audit") {
        rollog::info!(audit, "Filtered out below warn");
        rollog::warn!(audit, "Configuration reloaded by admin");
    }

    registry.close()?;
    Ok(())
}
