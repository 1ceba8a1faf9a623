use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};

use crate::{
    config,
    error::{InstallError, ShortcutError},
    fs_ops, payload,
    paths::{InstallPaths, PathResolver},
    shortcuts::{ShortcutRegistrar, ShortcutSpec},
};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallOptions {
    #[serde(rename = "createDesktopShortcut", default = "default_true")]
    pub create_desktop_shortcut: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            create_desktop_shortcut: true,
        }
    }
}

/// Terminal value of one install run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(err: &InstallError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
        }
    }
}

/// Outbound messages for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    Progress { message: String },
    Complete(InstallResult),
    CloseWindow,
}

/// Per-run handle on the notification channel. `complete` consumes it, so
/// nothing can be reported after the terminal result.
#[derive(Debug)]
pub struct ProgressSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    pub fn progress(&self, message: &str) {
        let sent = self.tx.send(Notification::Progress {
            message: message.to_string(),
        });
        if sent.is_err() {
            tracing::debug!("progress receiver dropped: {message}");
        }
    }

    pub fn complete(self, result: InstallResult) {
        if self.tx.send(Notification::Complete(result)).is_err() {
            tracing::debug!("complete receiver dropped");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ValidatingPayload,
    CreatingInstallDir,
    CopyingFiles,
    VerifyingExecutable,
    CreatingStartMenuShortcut,
    CreatingDesktopShortcut,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::ValidatingPayload => "Checking payload...",
            Stage::CreatingInstallDir => "Installing to system...",
            Stage::CopyingFiles => "Copying files...",
            Stage::VerifyingExecutable => "Verifying install...",
            Stage::CreatingStartMenuShortcut => "Creating shortcuts...",
            Stage::CreatingDesktopShortcut => "Creating desktop shortcut...",
        }
    }
}

/// Proof that the holder owns the single in-flight run.
#[derive(Debug)]
pub struct RunToken {
    _guard: OwnedMutexGuard<()>,
}

pub struct Installer<R> {
    resolver: PathResolver,
    registrar: R,
    description: String,
    run_lock: Arc<Mutex<()>>,
}

impl<R: ShortcutRegistrar> Installer<R> {
    pub fn new(resolver: PathResolver, registrar: R) -> Self {
        Self {
            resolver,
            registrar,
            description: config::DESCRIPTION.to_string(),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Claims the run slot, or fails if another run holds it.
    pub fn try_begin(&self) -> Result<RunToken, InstallError> {
        let guard = self
            .run_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| InstallError::AlreadyRunning)?;
        Ok(RunToken { _guard: guard })
    }

    /// Runs the whole sequence and reports exactly one `complete` on `sink`.
    /// Only payload, install-dir, copy and verify failures fail the run;
    /// shortcut problems are logged and absorbed.
    pub async fn install(
        &self,
        source_dir: &Path,
        options: InstallOptions,
        sink: ProgressSink,
    ) -> InstallResult {
        let _token = match self.try_begin() {
            Ok(token) => token,
            Err(err) => {
                tracing::warn!("Rejected install request: {err}");
                let result = InstallResult::failed(&err);
                sink.complete(result.clone());
                return result;
            }
        };

        tracing::info!(
            "Install started, createDesktopShortcut: {}",
            options.create_desktop_shortcut
        );
        let result = match self.run_stages(source_dir, options, &sink).await {
            Ok(()) => {
                tracing::info!("Install completed successfully");
                InstallResult::ok()
            }
            Err(err) => {
                tracing::error!("Install error: {err}");
                InstallResult::failed(&err)
            }
        };
        sink.complete(result.clone());
        result
    }

    async fn run_stages(
        &self,
        source_dir: &Path,
        options: InstallOptions,
        sink: &ProgressSink,
    ) -> Result<(), InstallError> {
        let paths = self.resolver.resolve(source_dir)?;

        enter(sink, Stage::ValidatingPayload);
        payload::ensure_payload(&paths.source_dir).await?;

        enter(sink, Stage::CreatingInstallDir);
        fs_ops::ensure_dir(&paths.install_dir)
            .await
            .map_err(|source| InstallError::DirectoryCreationFailed {
                path: paths.install_dir.clone(),
                source,
            })?;

        enter(sink, Stage::CopyingFiles);
        payload::copy_payload(&paths.source_dir, &paths.install_dir).await?;

        enter(sink, Stage::VerifyingExecutable);
        self.verify_executable(&paths).await?;

        enter(sink, Stage::CreatingStartMenuShortcut);
        match self.create_start_menu_shortcut(&paths).await {
            Ok(lnk) => tracing::info!("Start Menu shortcut created: {}", lnk.display()),
            Err(err) => tracing::warn!("Failed to create Start Menu shortcut: {err}"),
        }

        if !options.create_desktop_shortcut {
            tracing::info!("Desktop shortcut not requested");
            return Ok(());
        }
        let Some(desktop) = paths.desktop_dir.as_deref() else {
            tracing::warn!("Skipping desktop shortcut: no desktop folder resolved");
            return Ok(());
        };
        enter(sink, Stage::CreatingDesktopShortcut);
        tracing::info!("Desktop path found: {}", desktop.display());
        match self.create_shortcut(desktop, &paths.installed_executable).await {
            Ok(lnk) => tracing::info!("Desktop shortcut created: {}", lnk.display()),
            Err(err) => tracing::warn!("Failed to create Desktop shortcut: {err}"),
        }
        Ok(())
    }

    async fn verify_executable(&self, paths: &InstallPaths) -> Result<(), InstallError> {
        let is_file = tokio::fs::metadata(&paths.installed_executable)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(InstallError::ExecutableNotFound {
                name: self.resolver.executable_name().to_string(),
                path: paths.installed_executable.clone(),
            });
        }
        tracing::info!(
            "{} installed at: {}",
            self.resolver.executable_name(),
            paths.installed_executable.display()
        );
        Ok(())
    }

    async fn create_start_menu_shortcut(
        &self,
        paths: &InstallPaths,
    ) -> Result<PathBuf, ShortcutError> {
        fs_ops::ensure_dir(&paths.start_menu_dir)
            .await
            .map_err(|source| ShortcutError::CreateDir {
                path: paths.start_menu_dir.clone(),
                source,
            })?;
        self.create_shortcut(&paths.start_menu_dir, &paths.installed_executable)
            .await
    }

    async fn create_shortcut(
        &self,
        dir: &Path,
        target: &Path,
    ) -> Result<PathBuf, ShortcutError> {
        let spec = ShortcutSpec::new(target, &self.resolver.shortcut_path(dir), &self.description);
        self.registrar.create(&spec).await?;
        Ok(spec.shortcut_path)
    }
}

fn enter(sink: &ProgressSink, stage: Stage) {
    tracing::info!(stage = ?stage, "{}", stage.label());
    sink.progress(stage.label());
}
