//! Config command handler.

use vitalwatch::config::VitalwatchConfig;

/// Config command.
pub fn cmd_config(config: &VitalwatchConfig, show: bool) -> anyhow::Result<()> {
    if !show {
        println!("Use --show to print the effective configuration.");
        return Ok(());
    }

    match &config.source {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no config file found, using defaults"),
    }
    print!("{}", config.to_redacted_toml()?);
    Ok(())
}
