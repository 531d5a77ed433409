//! Point-to-point transport for in-memory images.
//!
//! One image per TCP connection: the sender dials, writes a fixed header and
//! the raw samples, and hangs up. The receiver keeps one listening socket per
//! port in a [`Registry`] so a pipeline can receive on the same port again and
//! again without rebinding.

pub mod codec;
pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod harness;
pub mod image;
pub mod ops;
pub mod registry;

pub use config::Limits;
pub use connection::Connection;
pub use constants::{DEFAULT_HOST, DEFAULT_PORT};
pub use error::{Error, Result};
pub use image::Image;
pub use ops::{NetworkCannon, ReceiveArgs, SendArgs, receive, send};
pub use registry::{Listener, Registry};

#[async_trait::async_trait]
pub trait Cannon: Send + Sync + 'static {
    /// Fire `image` at `host:port`. Returns once the last byte is written.
    async fn shoot(&self, image: &Image, host: &str, port: u16) -> Result<()>;

    /// Catch one image arriving on `port`. Waits for as long as it takes.
    async fn catch(&self, port: u16) -> Result<Image>;
}
