//! `skein config`: show the effective configuration.

use skein_config::SkeinConfig;

pub fn run(path: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path {
        println!("{}", SkeinConfig::config_dir().join("config.toml").display());
        return Ok(());
    }

    let config = SkeinConfig::load()?;
    print!("{}", config.to_toml());
    Ok(())
}
