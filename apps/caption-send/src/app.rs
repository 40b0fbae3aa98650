//! One-shot transfer: pick the image, optionally probe, send, print.

use anyhow::Context;
use tracing::{info, warn};

use captionlink_client::{
    ClientConfig, DisplaySurface, ImageSource, InputError, TransferController, TransferError,
    run_presenter,
};
use captionlink_protocol::{Endpoint, EndpointError};

use crate::cli::Cli;
use crate::terminal::{FileSource, Terminal};

/// Runs the command line's transfer. Returns whether a caption was printed.
pub async fn run(cli: &Cli, config: ClientConfig) -> anyhow::Result<bool> {
    let mut source = FileSource::new(&cli.image);
    let (succeeded, _) = transfer(&mut source, config, Terminal::stdio()).await?;
    Ok(succeeded)
}

/// Drives one transfer, rendering every event on `surface`.
///
/// Failures the user can act on are shown on the surface and reported as
/// `Ok(false)`; only a crashed background task is an `Err`.
pub async fn transfer<S, D>(
    source: &mut S,
    config: ClientConfig,
    surface: D,
) -> anyhow::Result<(bool, D)>
where
    S: ImageSource,
    D: DisplaySurface + Send + 'static,
{
    let probe_first = config.require_probe;
    let endpoint = config.endpoint();

    let controller = TransferController::new(config);
    let events = controller
        .take_events()
        .context("event receiver already taken")?;
    let presenter = tokio::spawn(async move {
        let mut surface = surface;
        run_presenter(events, &mut surface).await;
        surface
    });

    let result = drive(&controller, source, probe_first, endpoint).await;

    // Closing the controller ends the event stream once its tasks are done.
    drop(controller);
    let mut surface = presenter.await.context("event presenter panicked")?;

    match result? {
        Ok(succeeded) => Ok((succeeded, surface)),
        Err(message) => {
            surface.show_error(&message);
            Ok((false, surface))
        }
    }
}

/// Inner result: `Err(message)` for failures that never reached the event
/// channel, `Ok(false)` for failures already presented from it.
async fn drive<S: ImageSource>(
    controller: &TransferController,
    source: &mut S,
    probe_first: bool,
    endpoint: Result<Endpoint, EndpointError>,
) -> anyhow::Result<Result<bool, String>> {
    let payload = match source.pick_image() {
        Ok(payload) => payload,
        Err(e) => return Ok(Err(format!("No image selected: {e}"))),
    };

    if probe_first {
        let endpoint = match endpoint {
            Ok(endpoint) => endpoint,
            Err(e) => return Ok(Err(TransferError::from(InputError::from(e)).user_message())),
        };
        let join = match controller.probe(endpoint) {
            Ok(join) => join,
            Err(e) => return Ok(Err(e.user_message())),
        };
        if join.await.context("probe task panicked")?.is_err() {
            return Ok(Ok(false));
        }
    }

    let handle = match controller.send(payload) {
        Ok(handle) => handle,
        Err(e) => return Ok(Err(e.user_message())),
    };
    info!(session = %handle.id(), "transfer started");

    let wait = handle.wait();
    tokio::pin!(wait);
    let report = tokio::select! {
        report = &mut wait => report,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling transfer");
            controller.cancel();
            wait.await
        }
    }
    .context("transfer task panicked")?;

    Ok(Ok(report.outcome.is_ok()))
}
