pub mod config;
pub mod error;
pub mod fs_ops;
pub mod installer;
pub mod ipc;
pub mod launch;
pub mod logging;
pub mod paths;
pub mod payload;
pub mod shortcuts;

pub use error::{DesktopUnresolvable, InstallError, LaunchError, ShortcutError};
pub use installer::{InstallOptions, InstallResult, Installer, Notification, ProgressSink, Stage};
pub use paths::{InstallPaths, PathResolver, PlatformDirs};
pub use shortcuts::{ScriptShortcutRegistrar, ShortcutRegistrar, ShortcutSpec};
