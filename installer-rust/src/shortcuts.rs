use std::{
    ffi::OsString,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use tokio::process::Command;

use crate::error::ShortcutError;

/// One shell link to materialize. Built per shortcut and dropped once the
/// registrar has run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcutSpec {
    pub target_executable: PathBuf,
    pub shortcut_path: PathBuf,
    pub working_directory: PathBuf,
    pub description: String,
}

impl ShortcutSpec {
    pub fn new(target_executable: &Path, shortcut_path: &Path, description: &str) -> Self {
        let working_directory = target_executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self {
            target_executable: target_executable.to_path_buf(),
            shortcut_path: shortcut_path.to_path_buf(),
            working_directory,
            description: description.to_string(),
        }
    }
}

/// Writes a platform shell link for a [`ShortcutSpec`].
pub trait ShortcutRegistrar: Send + Sync {
    fn create(&self, spec: &ShortcutSpec) -> impl Future<Output = Result<(), ShortcutError>> + Send;
}

/// Drives `WScript.Shell.CreateShortcut` through a throwaway VBScript file.
///
/// The script lives in a temp file that is removed when the attempt ends,
/// whether the interpreter succeeded, failed, or never started.
#[derive(Debug, Clone)]
pub struct ScriptShortcutRegistrar {
    program: OsString,
    args: Vec<OsString>,
    script_dir: Option<PathBuf>,
}

impl Default for ScriptShortcutRegistrar {
    fn default() -> Self {
        Self::cscript()
    }
}

impl ScriptShortcutRegistrar {
    pub fn cscript() -> Self {
        Self::with_program("cscript", ["//nologo"])
    }

    pub fn with_program<I, S>(program: impl Into<OsString>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            script_dir: None,
        }
    }

    /// Place the transient script in `dir` instead of the system temp dir.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.script_dir = Some(dir.into());
        self
    }

    fn write_script(&self, script: &str) -> Result<tempfile::TempPath, ShortcutError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("jemini-shortcut-").suffix(".vbs");
        let mut file = match self.script_dir.as_ref() {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ShortcutError::WriteScript)?;
        file.write_all(&encode_utf16_bom(script))
            .and_then(|()| file.flush())
            .map_err(ShortcutError::WriteScript)?;
        // Close our handle so the interpreter can open the file; the path
        // still deletes itself on drop.
        Ok(file.into_temp_path())
    }
}

impl ShortcutRegistrar for ScriptShortcutRegistrar {
    async fn create(&self, spec: &ShortcutSpec) -> Result<(), ShortcutError> {
        let script = render_script(spec)?;
        let script_path = self.write_script(&script)?;
        tracing::info!(
            "Running VBScript to create shortcut: {}",
            spec.shortcut_path.display()
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&*script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output().await;
        if let Err(err) = script_path.close() {
            tracing::debug!("failed to remove shortcut script: {err}");
        }
        let output = output.map_err(|source| ShortcutError::Spawn {
            program: self.program.to_string_lossy().to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("VBScript stderr: {stderr}");
            return Err(ShortcutError::ScriptFailed {
                code: output.status.code(),
                stderr,
            });
        }
        tracing::info!("Shortcut created successfully: {}", spec.shortcut_path.display());
        Ok(())
    }
}

pub fn render_script(spec: &ShortcutSpec) -> Result<String, ShortcutError> {
    let link = vbs_quote("shortcut path", &spec.shortcut_path.to_string_lossy())?;
    let target = vbs_quote("target", &spec.target_executable.to_string_lossy())?;
    let working_dir = vbs_quote("working directory", &spec.working_directory.to_string_lossy())?;
    let description = vbs_quote("description", &spec.description)?;
    let lines = [
        "Set oWS = WScript.CreateObject(\"WScript.Shell\")".to_string(),
        format!("sLinkFile = {link}"),
        "Set oLink = oWS.CreateShortcut(sLinkFile)".to_string(),
        format!("oLink.TargetPath = {target}"),
        format!("oLink.WorkingDirectory = {working_dir}"),
        format!("oLink.Description = {description}"),
        "oLink.Save".to_string(),
    ];
    Ok(lines.join("\r\n") + "\r\n")
}

/// A VBScript string literal. Quotes are doubled; a line break would end the
/// statement and start attacker-chosen code, so those are refused outright.
fn vbs_quote(field: &'static str, value: &str) -> Result<String, ShortcutError> {
    if value.contains(['\r', '\n', '\0']) {
        return Err(ShortcutError::UnsafeValue { field });
    }
    Ok(format!("\"{}\"", value.replace('"', "\"\"")))
}

fn encode_utf16_bom(script: &str) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xFE];
    for unit in script.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}
