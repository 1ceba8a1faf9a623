#![cfg_attr(windows, windows_subsystem = "windows")]

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::io::BufReader;

use jemini_installer::{
    config,
    installer::{InstallOptions, Installer},
    ipc::Bridge,
    launch::{LaunchDispatcher, ProcessSpawner},
    logging, paths,
    paths::{PathResolver, PlatformDirs},
    shortcuts::ScriptShortcutRegistrar,
};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let root = paths::root_dir()?;
    logging::init(&logging::default_log_root())?;
    tracing::info!("{} installer {}", config::APP_NAME, config::VERSION);

    let resolver = PathResolver::new(PlatformDirs::from_env());
    let dispatcher = Arc::new(LaunchDispatcher::from_resolver(&resolver, ProcessSpawner));
    let installer = Arc::new(Installer::new(resolver, ScriptShortcutRegistrar::cscript()));
    let bridge = Bridge::new(installer, dispatcher, paths::payload_dir(&root));

    if has_flag(&args, "--launch") {
        return bridge.launch_once().await;
    }

    if has_flag(&args, "--install") {
        let options = InstallOptions {
            create_desktop_shortcut: !has_flag(&args, "--no-desktop-shortcut"),
        };
        let result = bridge.install_once(options, tokio::io::stdout()).await?;
        if !result.success {
            bail!("{}", result.error.unwrap_or_else(|| "install failed".to_string()));
        }
        return Ok(());
    }

    bridge
        .serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|arg| arg == flag)
}
