//! Line-delimited JSON transport between the presentation layer and the
//! installer core. Requests arrive one per line on the input, notifications
//! leave one per line on the output.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, sync::Arc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinSet,
};

use crate::{
    installer::{InstallOptions, InstallResult, Installer, Notification, ProgressSink},
    launch::{LaunchDispatcher, Spawner, WindowHandle},
    shortcuts::ShortcutRegistrar,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    Install(InstallOptions),
    LaunchApp,
    CloseWindow,
}

/// Closing the window means asking the presentation layer to do it.
struct ChannelWindow {
    tx: mpsc::UnboundedSender<Notification>,
}

impl WindowHandle for ChannelWindow {
    fn close(&self) {
        let _ = self.tx.send(Notification::CloseWindow);
    }
}

pub struct Bridge<R, S> {
    installer: Arc<Installer<R>>,
    dispatcher: Arc<LaunchDispatcher<S>>,
    source_dir: PathBuf,
}

impl<R, S> Bridge<R, S>
where
    R: ShortcutRegistrar + 'static,
    S: Spawner + 'static,
{
    pub fn new(
        installer: Arc<Installer<R>>,
        dispatcher: Arc<LaunchDispatcher<S>>,
        source_dir: PathBuf,
    ) -> Self {
        Self {
            installer,
            dispatcher,
            source_dir,
        }
    }

    /// Serves requests until `input` ends, then waits for in-flight installs
    /// so their `complete` still reaches `output`.
    pub async fn serve<I, O>(&self, input: I, output: O) -> Result<()>
    where
        I: AsyncBufRead + Unpin,
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_notifications(rx, output));
        let mut runs = JoinSet::new();

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await.context("read request")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Request>(line) {
                Ok(request) => self.dispatch(request, &tx, &mut runs).await,
                Err(err) => tracing::warn!("Ignoring malformed request {line:?}: {err}"),
            }
        }

        while let Some(joined) = runs.join_next().await {
            if let Err(err) = joined {
                tracing::error!("install task failed: {err}");
            }
        }
        drop(tx);
        writer.await.context("join notification writer")?
    }

    async fn dispatch(
        &self,
        request: Request,
        tx: &mpsc::UnboundedSender<Notification>,
        runs: &mut JoinSet<()>,
    ) {
        match request {
            Request::Install(options) => {
                let installer = self.installer.clone();
                let source_dir = self.source_dir.clone();
                let sink = ProgressSink::new(tx.clone());
                runs.spawn(async move {
                    installer.install(&source_dir, options, sink).await;
                });
            }
            Request::LaunchApp => {
                let window: Arc<dyn WindowHandle> = Arc::new(ChannelWindow { tx: tx.clone() });
                if let Err(err) = self.dispatcher.launch(Some(window)).await {
                    tracing::warn!("Launch skipped: {err}");
                }
            }
            Request::CloseWindow => {
                let _ = tx.send(Notification::CloseWindow);
            }
        }
    }

    /// One install run with notifications written to `output`.
    pub async fn install_once<O>(&self, options: InstallOptions, output: O) -> Result<InstallResult>
    where
        O: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(write_notifications(rx, output));
        let result = self
            .installer
            .install(&self.source_dir, options, ProgressSink::new(tx))
            .await;
        writer.await.context("join notification writer")??;
        Ok(result)
    }

    /// Launch failures are logged, never surfaced as a process error.
    pub async fn launch_once(&self) -> Result<()> {
        if let Err(err) = self.dispatcher.launch(None).await {
            tracing::warn!("Launch skipped: {err}");
        }
        Ok(())
    }
}

async fn write_notifications<O>(
    mut rx: mpsc::UnboundedReceiver<Notification>,
    mut output: O,
) -> Result<()>
where
    O: AsyncWrite + Unpin,
{
    while let Some(notification) = rx.recv().await {
        let mut line = serde_json::to_string(&notification).context("serialize notification")?;
        line.push('\n');
        output
            .write_all(line.as_bytes())
            .await
            .context("write notification")?;
        output.flush().await.context("flush notification")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_request() {
        let req: Request =
            serde_json::from_str(r#"{"type":"install","createDesktopShortcut":false}"#).unwrap();
        assert_eq!(
            req,
            Request::Install(InstallOptions {
                create_desktop_shortcut: false
            })
        );
    }

    #[test]
    fn install_request_defaults_desktop_shortcut() {
        let req: Request = serde_json::from_str(r#"{"type":"install"}"#).unwrap();
        assert_eq!(req, Request::Install(InstallOptions::default()));
    }

    #[test]
    fn parses_launch_and_close() {
        let launch: Request = serde_json::from_str(r#"{"type":"launch-app"}"#).unwrap();
        assert_eq!(launch, Request::LaunchApp);
        let close: Request = serde_json::from_str(r#"{"type":"close-window"}"#).unwrap();
        assert_eq!(close, Request::CloseWindow);
    }

    #[test]
    fn progress_notification_shape() {
        let json = serde_json::to_string(&Notification::Progress {
            message: "Copying files...".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"progress","message":"Copying files..."}"#);
    }
}
