//! Listening sockets, one per port, bound once and reused.
//!
//! A pipeline that receives on the same port over and over (`-loop`) keeps the
//! socket bound in between, so a sender that shows up early finds the port
//! open. Listeners are only released by [`Registry::shutdown`] or when the
//! registry itself is dropped; the process wide registry from [`global`] lives
//! until the process exits.

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, LazyLock, Mutex, MutexGuard},
};

use log::{debug, info};

use crate::{
    config::Limits,
    connection::Connection,
    constants::LISTEN_ADDR,
    error::{Error, Result},
    image::Image,
};

/// A bound socket accepting one peer at a time.
#[derive(Debug)]
pub struct Listener {
    port: u16,
    local_addr: SocketAddr,
    inner: tokio::sync::Mutex<tokio::net::TcpListener>,
}

impl Listener {
    fn bind(port: u16) -> Result<Self> {
        let bind_err = |source| Error::Bind { port, source };

        let addr = SocketAddr::from((LISTEN_ADDR, port));
        let socket = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        socket.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = socket.local_addr().map_err(bind_err)?;
        let listener = tokio::net::TcpListener::from_std(socket).map_err(bind_err)?;

        Ok(Self {
            port,
            local_addr,
            inner: tokio::sync::Mutex::new(listener),
        })
    }

    /// The port this listener was requested for.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for exactly one peer. Concurrent callers queue up behind each
    /// other, only one accept runs at a time.
    pub async fn accept(&self) -> Result<Connection> {
        let listener = self.inner.lock().await;
        let (stream, peer) = listener.accept().await?;
        Ok(Connection::accepted(stream, peer))
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    listeners: Mutex<HashMap<u16, Arc<Listener>>>,
}

static GLOBAL: LazyLock<Arc<Registry>> = LazyLock::new(|| Arc::new(Registry::new()));

/// The registry used by [`crate::receive`].
pub fn global() -> Arc<Registry> {
    Arc::clone(&GLOBAL)
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u16, Arc<Listener>>> {
        // the map stays consistent even if a holder panicked
        self.listeners
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Return the listener for `port`, binding it on first use. The lock is
    /// held across the bind, so a port is never bound twice.
    ///
    /// Has to be called from within a tokio runtime.
    pub fn get_or_create(&self, port: u16) -> Result<Arc<Listener>> {
        let mut listeners = self.lock();
        if let Some(listener) = listeners.get(&port) {
            return Ok(Arc::clone(listener));
        }

        let listener = Arc::new(Listener::bind(port)?);
        debug!("Bound {} for port {port}", listener.local_addr());
        listeners.insert(port, Arc::clone(&listener));
        Ok(listener)
    }

    pub fn contains(&self, port: u16) -> bool {
        self.lock().contains_key(&port)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<_> = self.lock().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    /// Release the listener for `port`. Returns whether one was held.
    pub fn release(&self, port: u16) -> bool {
        let released = self.lock().remove(&port).is_some();
        if released {
            debug!("Released port {port}");
        }
        released
    }

    /// Release every listener. Returns how many were held. Sockets close once
    /// the last outstanding handle to them is gone.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        if !drained.is_empty() {
            info!("Releasing {} listener(s)", drained.len());
        }
        drained.len()
    }

    /// Accept one peer on `port` and read one image from it.
    pub async fn receive(&self, port: u16, limits: &Limits) -> Result<Image> {
        let listener = self.get_or_create(port)?;

        info!("Listening on port {port}");
        let conn = listener.accept().await?;
        info!("Got a connection from {}, reading image...", conn.peer());

        conn.recv_image(limits).await
    }
}
