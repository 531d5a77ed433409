//! Self-test: send an image to ourselves over loopback and check that every
//! sample survives bit for bit.

use log::{info, warn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    config::Limits,
    constants::{TEST_HOST, TEST_PORT_ATTEMPTS, TEST_PORT_MAX, TEST_PORT_MIN},
    error::{Error, Result},
    image::Image,
    ops::send_with,
    registry::Registry,
};

const TEST_SEED: u64 = 0x5eed_cafe;

/// Image filled with uniform noise in `[0, 1)`. The same seed always yields
/// the same image.
pub fn test_image(
    width: usize,
    height: usize,
    frames: usize,
    channels: usize,
    seed: u64,
) -> Result<Image> {
    let mut im = Image::new(width, height, frames, channels)?;
    let mut rng = StdRng::seed_from_u64(seed);
    im.samples_mut().iter_mut().for_each(|s| *s = rng.r#gen());
    Ok(im)
}

/// Random port in `[10000, 15000)`, away from the default port.
pub fn pick_port() -> u16 {
    rand::thread_rng().gen_range(TEST_PORT_MIN..TEST_PORT_MAX)
}

/// Outcome of a self-test.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub port: u16,
    pub dims_match: bool,
    /// Statistics of `received - sent`.
    pub mean: f64,
    pub variance: f64,
}

impl Report {
    pub fn compare(sent: &Image, received: &Image, port: u16) -> Self {
        let Some(diff) = received.difference(sent) else {
            return Self {
                port,
                dims_match: false,
                mean: f64::NAN,
                variance: f64::NAN,
            };
        };

        let n = diff.samples().len() as f64;
        let mean = diff.samples().iter().map(|v| *v as f64).sum::<f64>() / n;
        let variance = diff
            .samples()
            .iter()
            .map(|v| (*v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        Self {
            port,
            dims_match: true,
            mean,
            variance,
        }
    }

    pub fn passed(&self) -> bool {
        self.dims_match && self.mean == 0.0 && self.variance == 0.0
    }
}

/// Send `image` to `host:port` from a spawned task while this task receives
/// it through `registry`.
///
/// The sender waits for a readiness signal that is only given once the
/// listener is bound, so it never dials a port nobody listens on yet.
pub async fn round_trip(
    registry: &Registry,
    image: &Image,
    host: &str,
    port: u16,
    limits: &Limits,
) -> Result<Image> {
    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel::<()>();

    let sent = image.clone();
    let host = host.to_owned();
    let sender_limits = limits.clone();
    let sender = tokio::spawn(async move {
        if ready_rx.await.is_err() {
            // listener never came up, the receiving side reports why
            return Ok(());
        }
        send_with(&sent, &host, port, &sender_limits).await
    });

    let received = match registry.get_or_create(port) {
        Ok(_) => {
            let _ = ready_tx.send(());
            registry.receive(port, limits).await
        }
        Err(e) => {
            drop(ready_tx);
            Err(e)
        }
    };

    let received = match received {
        Ok(im) => im,
        Err(e) => {
            // a sender stuck writing into an unread socket would never finish
            sender.abort();
            return Err(e);
        }
    };

    sender
        .await
        .map_err(|e| Error::Io(std::io::Error::other(format!("sender task failed: {e}"))))??;
    Ok(received)
}

/// Round trip a 123x234x5x2 noise image through a random loopback port.
///
/// The port is released from `registry` again afterwards, pass or fail, so
/// repeated self-tests do not pile up listening sockets.
pub async fn run_self_test(registry: &Registry, limits: &Limits) -> Result<Report> {
    let image = test_image(123, 234, 5, 2, TEST_SEED)?;

    let mut attempt = 1;
    let port = loop {
        let port = pick_port();
        // a port already in the registry belongs to someone else's -receive
        if registry.contains(port) {
            continue;
        }
        match registry.get_or_create(port) {
            Ok(_) => break port,
            Err(e @ Error::Bind { .. }) if attempt < TEST_PORT_ATTEMPTS => {
                warn!("{e}, trying another port");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    };

    info!("Self-test on port {port}");
    let received = round_trip(registry, &image, TEST_HOST, port, limits).await;
    registry.release(port);
    Ok(Report::compare(&image, &received?, port))
}
