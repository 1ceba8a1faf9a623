use std::{
    io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::Arc,
    time::Duration,
};

use crate::{config, error::LaunchError, paths::PathResolver};

/// Starts a process that outlives the installer.
pub trait Spawner: Send + Sync {
    fn spawn_detached(&self, exe: &Path) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessSpawner;

impl Spawner for ProcessSpawner {
    fn spawn_detached(&self, exe: &Path) -> io::Result<()> {
        let mut cmd = Command::new(exe);
        if let Some(dir) = exe.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const DETACHED_PROCESS: u32 = 0x00000008;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            cmd.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }
        // Dropping the child handle does not kill the process.
        cmd.spawn().map(|_child| ())
    }
}

/// Something the presentation layer can close.
pub trait WindowHandle: Send + Sync {
    fn close(&self);
}

pub struct LaunchDispatcher<S> {
    executable: Option<PathBuf>,
    spawner: S,
    close_delay: Duration,
}

impl<S: Spawner> LaunchDispatcher<S> {
    pub fn new(executable: PathBuf, spawner: S) -> Self {
        Self::with_target(Some(executable), spawner)
    }

    /// Resolves the install target up front but tolerates an environment
    /// where it cannot be resolved; `launch` then reports the failure.
    pub fn from_resolver(resolver: &PathResolver, spawner: S) -> Self {
        let executable = match resolver.installed_executable() {
            Ok(path) => Some(path),
            Err(err) => {
                tracing::warn!("Launch target unavailable: {err}");
                None
            }
        };
        Self::with_target(executable, spawner)
    }

    fn with_target(executable: Option<PathBuf>, spawner: S) -> Self {
        Self {
            executable,
            spawner,
            close_delay: Duration::from_millis(config::LAUNCH_CLOSE_DELAY_MS),
        }
    }

    pub fn with_close_delay(mut self, delay: Duration) -> Self {
        self.close_delay = delay;
        self
    }

    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Spawns the installed executable if present, then closes `window`
    /// after the configured delay. A missing executable is only reported.
    pub async fn launch(&self, window: Option<Arc<dyn WindowHandle>>) -> Result<(), LaunchError> {
        let Some(executable) = self.executable.as_deref() else {
            let err = LaunchError::Unresolved;
            tracing::warn!("{err}");
            return Err(err);
        };
        let exists = tokio::fs::metadata(executable)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !exists {
            let err = LaunchError::TargetMissing {
                path: executable.to_path_buf(),
            };
            tracing::warn!("{err}");
            return Err(err);
        }

        tracing::info!("Launching {}", executable.display());
        if let Err(source) = self.spawner.spawn_detached(executable) {
            // Window closes regardless of the spawn outcome.
            tracing::error!("Failed to launch app: {source}");
            self.schedule_close(window);
            return Err(LaunchError::Spawn {
                path: executable.to_path_buf(),
                source,
            });
        }
        self.schedule_close(window);
        Ok(())
    }

    fn schedule_close(&self, window: Option<Arc<dyn WindowHandle>>) {
        let Some(window) = window else {
            return;
        };
        let delay = self.close_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            window.close();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    };

    #[derive(Default)]
    struct RecordingSpawner {
        spawned: Mutex<Vec<PathBuf>>,
    }

    impl Spawner for RecordingSpawner {
        fn spawn_detached(&self, exe: &Path) -> io::Result<()> {
            self.spawned.lock().unwrap().push(exe.to_path_buf());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlagWindow {
        closed: AtomicBool,
    }

    impl WindowHandle for FlagWindow {
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn missing_executable_spawns_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher =
            LaunchDispatcher::new(tmp.path().join("Jemini.exe"), RecordingSpawner::default());
        let window = Arc::new(FlagWindow::default());

        let err = dispatcher
            .launch(Some(window.clone() as Arc<dyn WindowHandle>))
            .await
            .unwrap_err();

        assert!(matches!(err, LaunchError::TargetMissing { .. }));
        assert!(dispatcher.spawner.spawned.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!window.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unresolved_target_is_reported_not_spawned() {
        let resolver = PathResolver::new(crate::paths::PlatformDirs::default());
        let dispatcher = LaunchDispatcher::from_resolver(&resolver, RecordingSpawner::default());
        assert!(dispatcher.executable().is_none());

        let err = dispatcher.launch(None).await.unwrap_err();

        assert!(matches!(err, LaunchError::Unresolved));
        assert!(dispatcher.spawner.spawned.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn launch_spawns_and_closes_window_after_delay() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("Jemini.exe");
        std::fs::write(&exe, "binary").unwrap();
        let dispatcher = LaunchDispatcher::new(exe.clone(), RecordingSpawner::default())
            .with_close_delay(Duration::from_millis(50));
        let window = Arc::new(FlagWindow::default());

        dispatcher
            .launch(Some(window.clone() as Arc<dyn WindowHandle>))
            .await
            .unwrap();

        assert_eq!(*dispatcher.spawner.spawned.lock().unwrap(), vec![exe]);
        assert!(!window.closed.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(window.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn launch_without_window_only_spawns() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("Jemini.exe");
        std::fs::write(&exe, "binary").unwrap();
        let dispatcher = LaunchDispatcher::new(exe, RecordingSpawner::default());

        dispatcher.launch(None).await.unwrap();

        assert_eq!(dispatcher.spawner.spawned.lock().unwrap().len(), 1);
    }
}
