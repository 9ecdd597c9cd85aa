use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, info, info_span, warn, Instrument};

use super::session::Session;
use crate::codec::DEFAULT_MAX_ITEMS;
use crate::config::ServerConfig;
use crate::data::{CsvDirectory, DataSource};
use crate::error::Result;
use crate::store::DendrogramStore;

/// Accepts connections and runs one [`Session`] task per connection.
pub struct Server {
    listener: TcpListener,
    source: Arc<dyn DataSource>,
    store: Arc<DendrogramStore>,
    max_items: usize,
}

impl Server {
    /// Bind `addr`, serving tables from `source` and dendrograms from `store`.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        source: Arc<dyn DataSource>,
        store: DendrogramStore,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            source,
            store: Arc::new(store),
            max_items: DEFAULT_MAX_ITEMS,
        })
    }

    /// Bind according to `config`, with CSV tables from `config.data_dir`.
    pub async fn from_config(config: &ServerConfig) -> Result<Self> {
        let source = Arc::new(CsvDirectory::new(&config.data_dir));
        let store = DendrogramStore::new(&config.dendrogram_dir).with_max_items(config.max_items);
        Ok(Self::bind(config.listen.as_str(), source, store)
            .await?
            .with_max_items(config.max_items))
    }

    /// Set the upper bound on counts and string lengths read from peers.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Sessions already running are left to finish on their own.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    stream.set_nodelay(true).ok();

                    let session = Session::new(Arc::clone(&self.source), Arc::clone(&self.store))
                        .with_max_items(self.max_items);
                    tokio::spawn(
                        async move {
                            info!("connection accepted");
                            match session.run(stream).await {
                                Ok(()) => info!("session ended"),
                                Err(e) if e.is_disconnect() => debug!("connection reset by peer"),
                                Err(e) => warn!(error = %e.flatten(), "session failed"),
                            }
                        }
                        .instrument(info_span!("session", %peer)),
                    );
                }
            }
        }
    }
}
