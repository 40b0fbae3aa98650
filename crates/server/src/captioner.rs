//! Captioning backend seam.

use std::io::Write;
use std::process::{Command, Stdio};

/// Failure reported by a captioning backend.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct CaptionerError(pub String);

/// Turns encoded image bytes into a caption.
///
/// Called on a blocking thread; implementations may run heavy inference.
pub trait Captioner: Send + Sync + 'static {
    fn caption(&self, image: &[u8]) -> Result<String, CaptionerError>;
}

impl<F> Captioner for F
where
    F: Fn(&[u8]) -> Result<String, CaptionerError> + Send + Sync + 'static,
{
    fn caption(&self, image: &[u8]) -> Result<String, CaptionerError> {
        self(image)
    }
}

/// Answers every image with the same text.
#[derive(Debug, Clone)]
pub struct FixedCaptioner(pub String);

impl FixedCaptioner {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

impl Captioner for FixedCaptioner {
    fn caption(&self, _image: &[u8]) -> Result<String, CaptionerError> {
        Ok(self.0.clone())
    }
}

/// Runs an external program per image: the image goes to its stdin and
/// the trimmed stdout is the caption.
#[derive(Debug, Clone)]
pub struct CommandCaptioner {
    program: String,
    args: Vec<String>,
}

impl CommandCaptioner {
    /// `argv[0]` is the program. Returns `None` for an empty command.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl Captioner for CommandCaptioner {
    fn caption(&self, image: &[u8]) -> Result<String, CaptionerError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| CaptionerError(format!("starting {}: {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program may answer without reading all of its input.
            match stdin.write_all(image) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!(program = %self.program, "captioner closed stdin early");
                }
                Err(e) => return Err(CaptionerError(format!("writing image: {e}"))),
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| CaptionerError(format!("waiting for {}: {e}", self.program)))?;
        if !output.status.success() {
            return Err(CaptionerError(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let caption = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if caption.is_empty() {
            return Err(CaptionerError(format!("{} printed no caption", self.program)));
        }
        Ok(caption)
    }
}
