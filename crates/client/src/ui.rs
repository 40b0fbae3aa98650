//! Seams to the platform layer: where images come from and where results go.

use tokio::sync::mpsc;
use tracing::debug;

use captionlink_protocol::ImagePayload;

use crate::events::{Controls, Outcome, TransferEvent};

/// Failure to obtain an encoded image from the platform.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("image selection cancelled")]
    Cancelled,

    #[error("this source cannot {0}")]
    Unsupported(&'static str),

    #[error("failed to load image: {0}")]
    Failed(String),
}

/// Produces encoded image bytes (camera capture or gallery pick).
pub trait ImageSource {
    fn capture_image(&mut self) -> Result<ImagePayload, CaptureError>;

    fn pick_image(&mut self) -> Result<ImagePayload, CaptureError>;
}

/// Renders results and control state.
pub trait DisplaySurface {
    fn show_caption(&mut self, text: &str);

    fn show_error(&mut self, message: &str);

    fn set_controls_enabled(&mut self, controls: Controls);

    /// Called once a transfer has consumed the selected image.
    fn clear_selection(&mut self) {}

    /// Short status line (probe results and the like).
    fn show_status(&mut self, _message: &str) {}
}

/// Applies one event to the display.
pub fn present<D: DisplaySurface + ?Sized>(event: &TransferEvent, surface: &mut D) {
    match event {
        TransferEvent::ProbeSucceeded(report) => {
            surface.show_status(&format!("Connected to {}", report.endpoint));
        }
        TransferEvent::ProbeFailed { message, .. } => {
            surface.show_error(message);
        }
        TransferEvent::Completed { outcome, .. } => {
            match outcome {
                Outcome::Succeeded(caption) => surface.show_caption(caption.as_str()),
                Outcome::Failed { message, .. } => surface.show_error(&format!("Error: {message}")),
            }
            surface.clear_selection();
        }
        TransferEvent::ControlsChanged(controls) => surface.set_controls_enabled(*controls),
        TransferEvent::ProbeStarted { .. }
        | TransferEvent::SessionStarted { .. }
        | TransferEvent::StateChanged { .. } => {
            debug!(?event, "progress event");
        }
    }
}

/// Feeds every event from `events` to `surface` until the channel closes.
pub async fn run_presenter<D: DisplaySurface + ?Sized>(
    mut events: mpsc::UnboundedReceiver<TransferEvent>,
    surface: &mut D,
) {
    while let Some(event) = events.recv().await {
        present(&event, surface);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captionlink_protocol::Caption;
    use uuid::Uuid;

    use crate::error::ErrorKind;

    #[derive(Default)]
    struct Recorder {
        captions: Vec<String>,
        errors: Vec<String>,
        controls: Vec<Controls>,
        cleared: usize,
    }

    impl DisplaySurface for Recorder {
        fn show_caption(&mut self, text: &str) {
            self.captions.push(text.to_string());
        }

        fn show_error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }

        fn set_controls_enabled(&mut self, controls: Controls) {
            self.controls.push(controls);
        }

        fn clear_selection(&mut self) {
            self.cleared += 1;
        }
    }

    #[test]
    fn success_shows_caption_and_clears_selection() {
        let mut r = Recorder::default();
        present(
            &TransferEvent::Completed {
                session_id: Uuid::new_v4(),
                outcome: Outcome::Succeeded(Caption::from_text("a cat").unwrap()),
            },
            &mut r,
        );
        assert_eq!(r.captions, vec!["a cat"]);
        assert!(r.errors.is_empty());
        assert_eq!(r.cleared, 1);
    }

    #[test]
    fn failure_shows_prefixed_error() {
        let mut r = Recorder::default();
        present(
            &TransferEvent::Completed {
                session_id: Uuid::new_v4(),
                outcome: Outcome::Failed {
                    kind: ErrorKind::Io,
                    message: "Timed out while waiting for caption".into(),
                },
            },
            &mut r,
        );
        assert_eq!(r.errors, vec!["Error: Timed out while waiting for caption"]);
        assert_eq!(r.cleared, 1);
    }

    #[tokio::test]
    async fn presenter_drains_until_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(TransferEvent::ControlsChanged(Controls::TRANSFERRING))
            .unwrap();
        tx.send(TransferEvent::ControlsChanged(Controls::READY_FOR_IMAGE))
            .unwrap();
        drop(tx);

        let mut r = Recorder::default();
        run_presenter(rx, &mut r).await;
        assert_eq!(
            r.controls,
            vec![Controls::TRANSFERRING, Controls::READY_FOR_IMAGE]
        );
    }
}
