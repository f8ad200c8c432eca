//! Standby server: holds the port, closes every connection it accepts.

use std::net::SocketAddr;

use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::config::ServerConfig;
use crate::lifecycle::startup::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::server::{Listener, Server, ServerError};

pub struct StandbyServer {
    bind_address: String,
    max_connections: usize,
    bound: Option<std::net::TcpListener>,
}

impl StandbyServer {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            bind_address: config.bind_address.clone(),
            max_connections: config.max_connections,
            bound: None,
        }
    }

    /// Address actually bound, once initialized.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.as_ref().and_then(|listener| listener.local_addr().ok())
    }
}

impl Server for StandbyServer {
    fn initialize(&mut self) -> Result<(), ServerError> {
        let bind_error = |source| ServerError::Bind {
            address: self.bind_address.clone(),
            source,
        };
        let listener = std::net::TcpListener::bind(&self.bind_address).map_err(bind_error)?;
        listener.set_nonblocking(true).map_err(bind_error)?;

        tracing::info!(
            address = %self.bind_address,
            max_connections = self.max_connections,
            "Listener bound"
        );
        self.bound = Some(listener);
        Ok(())
    }

    async fn run(self, mut shutdown: broadcast::Receiver<()>) -> i32 {
        let Some(bound) = self.bound else {
            tracing::error!(error = %ServerError::NotInitialized, "Cannot run server");
            return EXIT_FAILURE;
        };
        let listener = match Listener::from_std(bound, self.max_connections) {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!(error = %e, "Cannot run server");
                return EXIT_FAILURE;
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown requested, closing listener");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((mut stream, peer, permit)) => {
                        tracing::info!(peer = %peer, "Incoming connection, server is in standby");
                        tokio::spawn(async move {
                            let _permit = permit;
                            if let Err(e) = stream.shutdown().await {
                                tracing::debug!(peer = %peer, error = %e, "Close failed");
                            }
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "Accept failed"),
                },
            }
        }

        EXIT_SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1:0".into(),
            max_connections: 4,
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn runs_until_shutdown() {
        let mut server = StandbyServer::new(&local_config());
        server.initialize().unwrap();
        let addr = server.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let task = tokio::spawn(server.run(shutdown.subscribe()));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut buf = [0u8; 8];
        let read = tokio::io::AsyncReadExt::read(&mut client, &mut buf).await.unwrap();
        assert_eq!(read, 0, "standby server closes connections");
        shutdown.trigger();

        assert_eq!(task.await.unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn bind_failure_is_reported() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let config = ServerConfig {
            bind_address: taken.local_addr().unwrap().to_string(),
            ..local_config()
        };

        let mut server = StandbyServer::new(&config);
        assert!(matches!(server.initialize(), Err(ServerError::Bind { .. })));
    }

    #[tokio::test]
    async fn run_without_initialize_fails() {
        let server = StandbyServer::new(&local_config());
        let shutdown = Shutdown::new();
        assert_eq!(server.run(shutdown.subscribe()).await, EXIT_FAILURE);
    }
}
