use serde::Deserialize;
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

fn main() {
    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR not set");
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let repo_root = PathBuf::from(manifest_dir).join("..");
    let config = load_config(&repo_root).unwrap_or_else(|err| {
        panic!("failed to load config.toml: {err}");
    });

    if config.name.trim().is_empty() {
        panic!("config.toml name is empty");
    }
    if config.executable.trim().is_empty() {
        panic!("config.toml executable is empty");
    }

    if let Err(err) = write_config_rs(&PathBuf::from(&out_dir), &config) {
        panic!("failed to write config: {err}");
    }
}

#[derive(Debug, Deserialize)]
struct Config {
    name: String,
    version: String,
    #[serde(default)]
    description: String,
    executable: String,
    payload_dir: String,
    #[serde(default = "default_close_delay")]
    launch_close_delay_ms: u64,
}

fn default_close_delay() -> u64 {
    500
}

fn load_config(repo_root: &Path) -> io::Result<Config> {
    let config_path = repo_root.join("config.toml");
    println!("cargo:rerun-if-changed={}", config_path.display());
    let contents = fs::read_to_string(&config_path)?;
    let cfg: Config = toml::from_str(&contents)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(cfg)
}

fn write_config_rs(out_dir: &Path, config: &Config) -> io::Result<()> {
    let out_path = out_dir.join("installer_config.rs");
    let mut file = File::create(&out_path)?;
    let description = if config.description.trim().is_empty() {
        config.name.as_str()
    } else {
        config.description.as_str()
    };
    writeln!(file, "pub const APP_NAME: &str = {:?};", config.name)?;
    writeln!(file, "pub const VERSION: &str = {:?};", config.version)?;
    writeln!(file, "pub const DESCRIPTION: &str = {:?};", description)?;
    writeln!(file, "pub const EXECUTABLE: &str = {:?};", config.executable)?;
    writeln!(file, "pub const PAYLOAD_DIR: &str = {:?};", config.payload_dir)?;
    writeln!(
        file,
        "pub const LAUNCH_CLOSE_DELAY_MS: u64 = {:?};",
        config.launch_close_delay_ms
    )?;
    Ok(())
}
