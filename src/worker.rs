//! Background bridge between the egui event loop and the async edit
//! client.
//!
//! The worker owns a dedicated thread with a Tokio runtime. The UI
//! sends commands over a channel and drains completion events with a
//! non-blocking poll each frame. Commands are handled one at a time,
//! so at most one edit request is ever in flight.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::mpsc;

use crate::gemini::GeminiClient;
use crate::session::EditedImage;

/// Events sent from the worker back to the UI.
pub enum EditEvent {
    /// The remote edit produced an image (and maybe a caption).
    Completed {
        image: EditedImage,
        caption: Option<String>,
    },
    /// The remote edit failed; the message is ready for display.
    Failed { message: String },
}

/// Commands sent from the UI to the worker.
enum EditCommand {
    Edit { bytes: Arc<[u8]>, prompt: String },
    Shutdown,
}

pub struct EditWorker {
    command_tx: mpsc::UnboundedSender<EditCommand>,
    event_rx: mpsc::UnboundedReceiver<EditEvent>,
}

impl EditWorker {
    /// Starts the worker thread. Fails if the API key is missing.
    pub fn new() -> Result<Self, String> {
        let client = GeminiClient::from_env()?;
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<EditCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<EditEvent>();

        std::thread::spawn(move || {
            let rt = match Runtime::new() {
                Ok(rt) => rt,
                Err(err) => {
                    let _ = event_tx.send(EditEvent::Failed {
                        message: format!("failed to start async runtime: {err}"),
                    });
                    return;
                }
            };

            rt.block_on(async move {
                while let Some(command) = command_rx.recv().await {
                    match command {
                        EditCommand::Edit { bytes, prompt } => {
                            log::info!(
                                "requesting edit: {} byte image, prompt {:?}",
                                bytes.len(),
                                prompt
                            );
                            match client.request_edit(&bytes, &prompt).await {
                                Ok(outcome) => {
                                    log::info!(
                                        "edit complete: {} byte {} result",
                                        outcome.image.bytes.len(),
                                        outcome.image.media_type
                                    );
                                    let _ = event_tx.send(EditEvent::Completed {
                                        image: outcome.image,
                                        caption: outcome.caption,
                                    });
                                }
                                Err(err) => {
                                    log::warn!("edit failed: {err}");
                                    let _ = event_tx.send(EditEvent::Failed {
                                        message: err.to_string(),
                                    });
                                }
                            }
                        }
                        EditCommand::Shutdown => break,
                    }
                }
            });
        });

        Ok(Self {
            command_tx,
            event_rx,
        })
    }

    /// Queues one edit request.
    pub fn request_edit(&self, bytes: Arc<[u8]>, prompt: String) -> Result<(), String> {
        self.command_tx
            .send(EditCommand::Edit { bytes, prompt })
            .map_err(|_| "edit worker is no longer running".to_string())
    }

    /// Drains pending events without blocking the UI thread.
    pub fn poll_events(&mut self) -> Vec<EditEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn shutdown(&self) {
        let _ = self.command_tx.send(EditCommand::Shutdown);
    }
}

impl Drop for EditWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
