use anyhow::{Context, Result};
use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::{
    config,
    error::{DesktopUnresolvable, InstallError},
};

pub const ROOT_OVERRIDE_VAR: &str = "JEMINI_INSTALLER_ROOT";

const LOCAL_APP_DATA_VAR: &str = "LOCALAPPDATA";
const ROAMING_APP_DATA_VAR: &str = "APPDATA";
const USER_PROFILE_VAR: &str = "USERPROFILE";

/// User-scope directories the resolver derives every location from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformDirs {
    pub local_app_data: Option<PathBuf>,
    pub roaming_app_data: Option<PathBuf>,
    pub user_profile: Option<PathBuf>,
}

impl PlatformDirs {
    pub fn from_env() -> Self {
        Self {
            local_app_data: env_dir(LOCAL_APP_DATA_VAR),
            roaming_app_data: env_dir(ROAMING_APP_DATA_VAR),
            user_profile: env_dir(USER_PROFILE_VAR),
        }
    }
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|v: &OsString| !v.is_empty())
        .map(PathBuf::from)
}

pub fn self_path() -> Result<PathBuf> {
    std::env::current_exe().context("current_exe")
}

/// Directory holding the bundled payload folder: the override variable if
/// set, otherwise the installer executable's own directory.
pub fn root_dir() -> Result<PathBuf> {
    if let Some(dev_root) = env_dir(ROOT_OVERRIDE_VAR) {
        return Ok(dev_root);
    }
    let exe = self_path()?;
    Ok(exe.parent().context("exe has no parent")?.to_path_buf())
}

pub fn payload_dir(root: &Path) -> PathBuf {
    root.join(config::PAYLOAD_DIR)
}

/// Every location a single run touches. Recomputed for each run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub source_dir: PathBuf,
    pub install_dir: PathBuf,
    pub start_menu_dir: PathBuf,
    pub desktop_dir: Option<PathBuf>,
    pub installed_executable: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    dirs: PlatformDirs,
    app_name: String,
    executable: String,
}

impl PathResolver {
    pub fn new(dirs: PlatformDirs) -> Self {
        Self::with_names(dirs, config::APP_NAME, config::EXECUTABLE)
    }

    pub fn with_names(dirs: PlatformDirs, app_name: &str, executable: &str) -> Self {
        Self {
            dirs,
            app_name: app_name.to_string(),
            executable: executable.to_string(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn executable_name(&self) -> &str {
        &self.executable
    }

    /// `<local-app-data>/<AppName>`. Never a machine-wide location, so the
    /// install works without elevation.
    pub fn install_dir(&self) -> Result<PathBuf, InstallError> {
        let local = self
            .dirs
            .local_app_data
            .as_ref()
            .ok_or(InstallError::MissingEnvironment(LOCAL_APP_DATA_VAR))?;
        Ok(local.join(&self.app_name))
    }

    pub fn installed_executable(&self) -> Result<PathBuf, InstallError> {
        Ok(self.install_dir()?.join(&self.executable))
    }

    pub fn start_menu_dir(&self) -> Result<PathBuf, InstallError> {
        let roaming = self
            .dirs
            .roaming_app_data
            .as_ref()
            .ok_or(InstallError::MissingEnvironment(ROAMING_APP_DATA_VAR))?;
        Ok(roaming
            .join("Microsoft")
            .join("Windows")
            .join("Start Menu")
            .join("Programs"))
    }

    /// `<profile>/Desktop`, falling back to `<profile>/OneDrive/Desktop` when
    /// the desktop has been redirected.
    pub fn desktop_dir(&self) -> Result<PathBuf, DesktopUnresolvable> {
        let Some(profile) = self.dirs.user_profile.as_ref() else {
            return Err(DesktopUnresolvable { tried: Vec::new() });
        };
        let candidates = [
            profile.join("Desktop"),
            profile.join("OneDrive").join("Desktop"),
        ];
        for candidate in &candidates {
            tracing::debug!("Checking desktop path: {}", candidate.display());
            if candidate.is_dir() {
                return Ok(candidate.clone());
            }
        }
        Err(DesktopUnresolvable {
            tried: candidates.to_vec(),
        })
    }

    pub fn shortcut_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.lnk", self.app_name))
    }

    pub fn resolve(&self, source_dir: &Path) -> Result<InstallPaths, InstallError> {
        let desktop_dir = match self.desktop_dir() {
            Ok(dir) => Some(dir),
            Err(err) => {
                tracing::info!("Desktop folder unavailable: {err}");
                None
            }
        };
        Ok(InstallPaths {
            source_dir: source_dir.to_path_buf(),
            install_dir: self.install_dir()?,
            start_menu_dir: self.start_menu_dir()?,
            desktop_dir,
            installed_executable: self.installed_executable()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn dirs_in(root: &Path) -> PlatformDirs {
        PlatformDirs {
            local_app_data: Some(root.join("Local")),
            roaming_app_data: Some(root.join("Roaming")),
            user_profile: Some(root.join("profile")),
        }
    }

    #[test]
    fn install_dir_is_under_local_app_data() {
        let root = PathBuf::from(r"C:\Users\me\AppData");
        let resolver = PathResolver::with_names(dirs_in(&root), "MyApp", "MyApp.exe");
        assert_eq!(resolver.install_dir().unwrap(), root.join("Local").join("MyApp"));
        assert_eq!(
            resolver.installed_executable().unwrap(),
            root.join("Local").join("MyApp").join("MyApp.exe")
        );
    }

    #[test]
    fn install_dir_requires_local_app_data() {
        let resolver = PathResolver::with_names(PlatformDirs::default(), "MyApp", "MyApp.exe");
        let err = resolver.install_dir().unwrap_err();
        assert!(matches!(err, InstallError::MissingEnvironment("LOCALAPPDATA")));
        assert_eq!(err.to_string(), "LOCALAPPDATA not set");
    }

    #[test]
    fn start_menu_dir_is_programs_folder() {
        let root = PathBuf::from(r"C:\Users\me\AppData");
        let resolver = PathResolver::with_names(dirs_in(&root), "MyApp", "MyApp.exe");
        assert_eq!(
            resolver.start_menu_dir().unwrap(),
            root.join("Roaming")
                .join("Microsoft")
                .join("Windows")
                .join("Start Menu")
                .join("Programs")
        );
    }

    #[test]
    fn desktop_prefers_profile_desktop() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("profile");
        fs::create_dir_all(profile.join("Desktop")).unwrap();
        fs::create_dir_all(profile.join("OneDrive").join("Desktop")).unwrap();

        let resolver = PathResolver::with_names(dirs_in(tmp.path()), "MyApp", "MyApp.exe");
        assert_eq!(resolver.desktop_dir().unwrap(), profile.join("Desktop"));
    }

    #[test]
    fn desktop_falls_back_to_onedrive() {
        let tmp = tempfile::tempdir().unwrap();
        let profile = tmp.path().join("profile");
        fs::create_dir_all(profile.join("OneDrive").join("Desktop")).unwrap();

        let resolver = PathResolver::with_names(dirs_in(tmp.path()), "MyApp", "MyApp.exe");
        assert_eq!(
            resolver.desktop_dir().unwrap(),
            profile.join("OneDrive").join("Desktop")
        );
    }

    #[test]
    fn desktop_unresolvable_lists_candidates() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = PathResolver::with_names(dirs_in(tmp.path()), "MyApp", "MyApp.exe");
        let err = resolver.desktop_dir().unwrap_err();
        assert_eq!(err.tried.len(), 2);

        let paths = resolver.resolve(&tmp.path().join("payload")).unwrap();
        assert_eq!(paths.desktop_dir, None);
    }

    #[test]
    fn shortcut_path_adds_lnk() {
        let resolver = PathResolver::with_names(PlatformDirs::default(), "MyApp", "MyApp.exe");
        let base = PathBuf::from(r"C:\StartMenu");
        assert_eq!(resolver.shortcut_path(&base), base.join("MyApp.lnk"));
    }
}
