//! Port-bound listener.
//!
//! # Responsibilities
//! - Bind a TCP socket to the requested port (0 = OS-assigned)
//! - Publish the actual port as soon as bind succeeds
//! - Run the HTTP accept loop until shutdown
//! - Drain in-flight requests on shutdown, bounded by a deadline
//!
//! # Design Decisions
//! - Single-use: once shut down, a listener cannot be bound again
//! - The bound address sits behind a reader/writer lock; bind writes it once,
//!   any number of tasks may poll it concurrently
//! - A shutdown-triggered stop is a clean return, not an error

use std::future::IntoFuture;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use axum::Router;
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::ListenerError;
use crate::lifecycle::Shutdown;

/// Where a listener is in its single-use lifecycle.
#[derive(Debug)]
enum State {
    /// Created, socket not yet opened.
    Unbound,
    /// Socket open, accept loop not started.
    Bound(TcpListener),
    /// Accept loop owns the socket.
    Serving,
    /// Socket closed.
    Stopped,
}

/// A TCP listener plus the HTTP server running on it.
#[derive(Debug)]
pub struct Listener {
    /// Name used in log fields.
    name: &'static str,
    /// Interface to bind on.
    ip: IpAddr,
    /// Port requested at construction (0 = ephemeral).
    requested_port: u16,
    /// Address actually bound. `None` until bind succeeds.
    local_addr: RwLock<Option<SocketAddr>>,
    state: Mutex<State>,
    /// Graceful stop: refuse new connections, let in-flight ones finish.
    drain: Shutdown,
    /// Hard stop once the drain deadline has passed.
    abort: Shutdown,
    /// Flipped by the accept loop when it has returned.
    stopped: watch::Sender<bool>,
}

impl Listener {
    /// Create an unbound listener for `port` on all interfaces.
    pub fn new(name: &'static str, port: u16) -> Self {
        Self::with_ip(name, IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)
    }

    /// Create an unbound listener for `port` on a specific interface.
    pub fn with_ip(name: &'static str, ip: IpAddr, port: u16) -> Self {
        let (stopped, _) = watch::channel(false);
        Self {
            name,
            ip,
            requested_port: port,
            local_addr: RwLock::new(None),
            state: Mutex::new(State::Unbound),
            drain: Shutdown::new(),
            abort: Shutdown::new(),
            stopped,
        }
    }

    /// Open the listen socket and return the port actually bound.
    ///
    /// On failure the listener stays unbound and unusable.
    pub async fn bind(&self) -> Result<u16, ListenerError> {
        if !matches!(*self.state.lock(), State::Unbound) {
            return Err(ListenerError::Bind {
                port: self.requested_port,
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    "listener has already been bound",
                ),
            });
        }

        let addr = SocketAddr::new(self.ip, self.requested_port);
        let bind_err = |source| ListenerError::Bind {
            port: self.requested_port,
            source,
        };

        let listener = TcpListener::bind(addr).await.map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        {
            let mut state = self.state.lock();
            if !matches!(*state, State::Unbound) {
                // Shut down (or bound by someone else) while we were binding.
                return Err(bind_err(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "listener was shut down during bind",
                )));
            }
            *state = State::Bound(listener);
        }
        *self.local_addr.write() = Some(local_addr);

        tracing::info!(
            listener = self.name,
            address = %local_addr,
            "Listener bound"
        );

        Ok(local_addr.port())
    }

    /// Serve `router` until shutdown.
    ///
    /// Returns `Ok(())` when stopped by [`Listener::shutdown`], including when
    /// shutdown happened before serving began.
    pub async fn serve(&self, router: Router) -> Result<(), ListenerError> {
        let listener = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Serving) {
                State::Bound(listener) => listener,
                State::Stopped => {
                    *state = State::Stopped;
                    return Ok(());
                }
                other => {
                    *state = other;
                    return Err(ListenerError::Accept(std::io::Error::new(
                        std::io::ErrorKind::NotConnected,
                        "listener is not bound",
                    )));
                }
            }
        };

        tracing::info!(listener = self.name, port = self.port(), "Serving");

        let serve = axum::serve(listener, router)
            .with_graceful_shutdown(self.drain.triggered())
            .into_future();

        let result = tokio::select! {
            res = serve => res.map_err(ListenerError::Accept),
            _ = self.abort.triggered() => {
                tracing::warn!(listener = self.name, "Accept loop aborted after drain deadline");
                Ok(())
            }
        };

        *self.state.lock() = State::Stopped;
        self.stopped.send_replace(true);

        match &result {
            Ok(()) => tracing::info!(listener = self.name, "Listener stopped"),
            Err(e) => tracing::error!(listener = self.name, error = %e, "Listener failed"),
        }
        result
    }

    /// Gracefully stop the listener, waiting at most `timeout` for in-flight
    /// requests to finish.
    ///
    /// A listener that never bound, or never started serving, is closed
    /// immediately and reports success.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ListenerError> {
        let serving = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Serving => {
                    *state = State::Serving;
                    true
                }
                // Dropping a Bound socket closes it.
                State::Unbound | State::Bound(_) | State::Stopped => false,
            }
        };
        if !serving {
            return Ok(());
        }

        tracing::info!(listener = self.name, timeout = ?timeout, "Draining");
        self.drain.trigger();

        let mut stopped = self.stopped.subscribe();
        let drained = tokio::time::timeout(timeout, stopped.wait_for(|done| *done))
            .await
            .map(|_| ());
        match drained {
            Ok(()) => Ok(()),
            Err(_) => {
                tracing::warn!(
                    listener = self.name,
                    timeout = ?timeout,
                    "Drain deadline exceeded"
                );
                self.abort.trigger();
                Err(ListenerError::DrainTimeout { timeout })
            }
        }
    }

    /// The bound port, or 0 before a successful bind.
    pub fn port(&self) -> u16 {
        self.local_addr.read().map(|addr| addr.port()).unwrap_or(0)
    }

    /// The bound address, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::sync::Arc;

    fn localhost(port: u16) -> Listener {
        Listener::with_ip("test", IpAddr::V4(Ipv4Addr::LOCALHOST), port)
    }

    #[tokio::test]
    async fn port_is_zero_before_bind() {
        let listener = localhost(0);
        assert_eq!(listener.port(), 0);
        assert!(listener.local_addr().is_none());
    }

    #[tokio::test]
    async fn ephemeral_bind_publishes_port() {
        let listener = localhost(0);
        let port = listener.bind().await.unwrap();
        assert!(port > 0);
        assert_eq!(listener.port(), port);
    }

    #[tokio::test]
    async fn explicit_port_is_honoured() {
        // Find a free port, release it, then ask for it by number.
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let wanted = probe.local_addr().unwrap().port();
        drop(probe);

        let listener = localhost(wanted);
        assert_eq!(listener.bind().await.unwrap(), wanted);
        assert_eq!(listener.port(), wanted);
    }

    #[tokio::test]
    async fn port_in_use_fails_to_bind() {
        let first = localhost(0);
        let port = first.bind().await.unwrap();

        let second = localhost(port);
        let err = second.bind().await.unwrap_err();
        assert!(matches!(err, ListenerError::Bind { port: p, .. } if p == port));
        assert_eq!(second.port(), 0);
    }

    #[tokio::test]
    async fn cannot_rebind() {
        let listener = localhost(0);
        listener.bind().await.unwrap();
        assert!(listener.bind().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_unbound_is_noop() {
        let listener = localhost(0);
        listener.shutdown(Duration::from_millis(10)).await.unwrap();
        // Single-use: no bind after shutdown.
        assert!(listener.bind().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_before_serve_closes_socket() {
        let listener = localhost(0);
        listener.bind().await.unwrap();
        listener.shutdown(Duration::from_millis(10)).await.unwrap();
        listener.serve(Router::new()).await.unwrap();
    }

    #[tokio::test]
    async fn serve_stops_cleanly_on_shutdown() {
        let listener = Arc::new(localhost(0));
        listener.bind().await.unwrap();

        let router = Router::new().route("/", get(|| async { "ok" }));
        let task = tokio::spawn({
            let listener = listener.clone();
            async move { listener.serve(router).await }
        });

        // Give the accept loop a chance to start.
        tokio::time::sleep(Duration::from_millis(50)).await;
        listener.shutdown(Duration::from_secs(5)).await.unwrap();
        task.await.unwrap().unwrap();
    }
}
