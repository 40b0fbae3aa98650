//! File-backed image source and a stdout/stderr display.

use std::io::Write;
use std::path::PathBuf;

use captionlink_client::{CaptureError, Controls, DisplaySurface, ImageSource};
use captionlink_protocol::ImagePayload;

/// Reads the image from a file given on the command line.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageSource for FileSource {
    fn capture_image(&mut self) -> Result<ImagePayload, CaptureError> {
        Err(CaptureError::Unsupported("capture from a camera"))
    }

    fn pick_image(&mut self) -> Result<ImagePayload, CaptureError> {
        std::fs::read(&self.path)
            .map(ImagePayload::new)
            .map_err(|e| CaptureError::Failed(format!("{}: {e}", self.path.display())))
    }
}

/// Caption on stdout, everything else on stderr.
pub struct Terminal<O, E> {
    out: O,
    err: E,
}

impl Terminal<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> Terminal<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    #[cfg(test)]
    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }
}

impl<O: Write, E: Write> DisplaySurface for Terminal<O, E> {
    fn show_caption(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::warn!(error = %e, "failed to write caption");
        }
    }

    fn show_error(&mut self, message: &str) {
        if let Err(e) = writeln!(self.err, "{message}") {
            tracing::warn!(error = %e, "failed to write error message");
        }
    }

    fn set_controls_enabled(&mut self, controls: Controls) {
        tracing::trace!(?controls, "controls changed");
    }

    fn show_status(&mut self, message: &str) {
        tracing::info!("{message}");
    }
}
