use std::fs;

use jemini_installer::{PathResolver, PlatformDirs};

#[test]
fn resolve_selects_onedrive_desktop_when_profile_desktop_absent() {
    let tmp = tempfile::tempdir().unwrap();
    let profile = tmp.path().join("profile");
    fs::create_dir_all(profile.join("OneDrive").join("Desktop")).unwrap();
    let dirs = PlatformDirs {
        local_app_data: Some(tmp.path().join("Local")),
        roaming_app_data: Some(tmp.path().join("Roaming")),
        user_profile: Some(profile.clone()),
    };

    let paths = PathResolver::with_names(dirs, "MyApp", "MyApp.exe")
        .resolve(&tmp.path().join("payload"))
        .unwrap();

    assert_eq!(paths.desktop_dir, Some(profile.join("OneDrive").join("Desktop")));
    assert_eq!(paths.install_dir, tmp.path().join("Local").join("MyApp"));
    assert_eq!(paths.installed_executable, paths.install_dir.join("MyApp.exe"));
    assert!(!paths.install_dir.exists());
}
