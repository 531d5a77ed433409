use std::net::SocketAddr;

use log::{debug, info};
use tokio::{io::AsyncWriteExt, net::TcpStream};

use crate::{
    codec,
    config::Limits,
    error::{Error, Result},
    image::Image,
};

/// One socket carrying exactly one image. The transfer methods consume the
/// connection, so it is closed as soon as the image is through.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl Connection {
    /// Resolve `host` and connect to the first address that answers.
    pub async fn dial(host: &str, port: u16, limits: &Limits) -> Result<Self> {
        let endpoint = format!("{host}:{port}");
        let connect = TcpStream::connect(endpoint.as_str());

        let stream = match limits.connect_timeout {
            None => connect.await,
            Some(timeout) => match tokio::time::timeout(timeout, connect).await {
                Ok(res) => res,
                Err(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("no answer within {timeout:?}"),
                )),
            },
        }
        .map_err(|source| Error::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;

        let peer = stream.peer_addr().map_err(|source| Error::Connect {
            endpoint: endpoint.clone(),
            source,
        })?;
        debug!("Connected to {endpoint} ({peer})");
        Ok(Self { stream, peer })
    }

    pub(crate) fn accepted(stream: TcpStream, peer: SocketAddr) -> Self {
        Self { stream, peer }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Write the whole encoded image, then close.
    pub async fn send_image(mut self, image: &Image) -> Result<()> {
        codec::write_image(&mut self.stream, image).await?;
        self.stream.shutdown().await?;
        info!(
            "Sent {}x{}x{}x{} image to {}",
            image.width(),
            image.height(),
            image.frames(),
            image.channels(),
            self.peer
        );
        Ok(())
    }

    /// Read one image, then close.
    pub async fn recv_image(mut self, limits: &Limits) -> Result<Image> {
        codec::read_image(&mut self.stream, limits).await
    }
}
