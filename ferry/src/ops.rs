use std::sync::Arc;

use crate::{
    Cannon,
    config::Limits,
    connection::Connection,
    constants::{DEFAULT_HOST, DEFAULT_PORT},
    error::{Error, Result},
    image::Image,
    registry::{self, Registry},
};

pub const SEND_HELP: &str = "\
-send sends an image over a TCP connection. It has an optional first and second
argument. The first argument specifies which server to contact, and the second
argument specifies the port. By default, 127.0.0.1:5678 is used.

Usage: wharf -receive -send otherhost 5678
";

pub const RECEIVE_HELP: &str = "\
-receive sets up a TCP server and listens for an image (such as that sent by
-send). The sole optional argument is the port to listen on. It defaults
to 5678.

Usage: wharf -receive 5243 -dimensions

       wharf -loop --receive --send somewhereelse
";

fn parse_port(op: &str, raw: &str) -> Result<u16> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(Error::argument(format!(
            "{op}: '{raw}' is not a valid port"
        ))),
        Ok(port) => Ok(port),
    }
}

/// Destination of `-send`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendArgs {
    pub host: String,
    pub port: u16,
}

impl Default for SendArgs {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
        }
    }
}

impl SendArgs {
    /// `[]`, `[host]` or `[host, port]`.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args {
            [] => Ok(Self::default()),
            [host] => Ok(Self {
                host: host.as_ref().to_owned(),
                ..Self::default()
            }),
            [host, port] => Ok(Self {
                host: host.as_ref().to_owned(),
                port: parse_port("-send", port.as_ref())?,
            }),
            _ => Err(Error::argument("-send takes at most two arguments")),
        }
    }
}

/// Port of `-receive`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReceiveArgs {
    pub port: u16,
}

impl Default for ReceiveArgs {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

impl ReceiveArgs {
    /// `[]` or `[port]`.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        match args {
            [] => Ok(Self::default()),
            [port] => Ok(Self {
                port: parse_port("-receive", port.as_ref())?,
            }),
            _ => Err(Error::argument("-receive takes zero or one argument")),
        }
    }
}

/// Send `image` to `host:port` and close the connection.
pub async fn send(image: &Image, host: &str, port: u16) -> Result<()> {
    send_with(image, host, port, &Limits::default()).await
}

pub async fn send_with(image: &Image, host: &str, port: u16, limits: &Limits) -> Result<()> {
    Connection::dial(host, port, limits)
        .await?
        .send_image(image)
        .await
}

/// Wait for one image on `port`, using the process wide listener registry.
pub async fn receive(port: u16) -> Result<Image> {
    registry::global().receive(port, &Limits::default()).await
}

/// The real network behind [`Cannon`].
#[derive(Clone, Debug)]
pub struct NetworkCannon {
    registry: Arc<Registry>,
    limits: Limits,
}

impl Default for NetworkCannon {
    fn default() -> Self {
        Self::new(registry::global(), Limits::default())
    }
}

impl NetworkCannon {
    pub fn new(registry: Arc<Registry>, limits: Limits) -> Self {
        Self { registry, limits }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

#[async_trait::async_trait]
impl Cannon for NetworkCannon {
    async fn shoot(&self, image: &Image, host: &str, port: u16) -> Result<()> {
        send_with(image, host, port, &self.limits).await
    }

    async fn catch(&self, port: u16) -> Result<Image> {
        self.registry.receive(port, &self.limits).await
    }
}
