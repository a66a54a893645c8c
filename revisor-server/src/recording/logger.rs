use anyhow::Result;
use revisor_core::RecordedEvent;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Appends recorded HTTP events to a JSONL file from a background task.
///
/// Cloning is cheap; every clone feeds the same writer.
#[derive(Clone)]
pub struct RecordingLogger {
    sender: mpsc::UnboundedSender<RecordedEvent>,
}

impl RecordingLogger {
    /// Start the writer task. Must be called from inside a tokio runtime.
    pub fn spawn(log_file_path: PathBuf) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            if let Err(e) = write_events(log_file_path, receiver).await {
                error!("Recording logger stopped: {}", e);
            }
        });

        Self { sender }
    }

    pub fn record(&self, event: RecordedEvent) {
        if self.sender.send(event).is_err() {
            error!("Dropping recorded event: writer task is gone");
        }
    }
}

async fn write_events(
    log_file_path: PathBuf,
    mut receiver: mpsc::UnboundedReceiver<RecordedEvent>,
) -> Result<()> {
    if let Some(parent) = log_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
        .await?;

    info!("Recording HTTP traffic to {}", log_file_path.display());

    while let Some(event) = receiver.recv().await {
        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize recorded event: {}", e);
                continue;
            }
        };

        if let Err(e) = file.write_all(format!("{}\n", line).as_bytes()).await {
            error!("Failed to write recorded event: {}", e);
            continue;
        }
        if let Err(e) = file.flush().await {
            error!("Failed to flush recording log: {}", e);
        }
    }

    Ok(())
}
