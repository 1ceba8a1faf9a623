use std::path::PathBuf;

/// Failures that end an install run. The `Display` text is what the
/// presentation layer shows to the user.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    #[error("{name} folder not found: {}", .path.display())]
    PayloadMissing { name: String, path: PathBuf },
    #[error("{name} not found after copy: {}", .path.display())]
    ExecutableNotFound { name: String, path: PathBuf },
    #[error("failed to create {}: {source}", .path.display())]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read {}: {source}", .path.display())]
    PayloadRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to copy {} -> {}: {source}", .src.display(), .dest.display())]
    CopyFailed {
        src: PathBuf,
        dest: PathBuf,
        source: std::io::Error,
    },
    #[error("{0} not set")]
    MissingEnvironment(&'static str),
    #[error("an install is already in progress")]
    AlreadyRunning,
}

/// A single shortcut attempt failed. Never fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ShortcutError {
    #[error("shortcut {field} contains a line break or NUL")]
    UnsafeValue { field: &'static str },
    #[error("failed to create {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write shortcut script: {0}")]
    WriteScript(std::io::Error),
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("shortcut script failed (exit {code:?}): {stderr}")]
    ScriptFailed { code: Option<i32>, stderr: String },
}

/// Neither `<profile>/Desktop` nor `<profile>/OneDrive/Desktop` exists.
#[derive(Debug, thiserror::Error)]
#[error("desktop path not found, tried: {}", format_tried(.tried))]
pub struct DesktopUnresolvable {
    pub tried: Vec<PathBuf>,
}

fn format_tried(tried: &[PathBuf]) -> String {
    if tried.is_empty() {
        return "USERPROFILE not set".to_string();
    }
    tried
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("install location could not be resolved")]
    Unresolved,
    #[error("installed executable not found: {}", .path.display())]
    TargetMissing { path: PathBuf },
    #[error("failed to launch {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        source: std::io::Error,
    },
}
