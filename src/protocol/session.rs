use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, info, warn};

use super::{encode_response, AsyncWireReader, Reply, Request};
use crate::cluster::{Agglomerative, Dendrogram, Linkage};
use crate::codec::DEFAULT_MAX_ITEMS;
use crate::data::{DataSource, Dataset};
use crate::error::{Error, Result};
use crate::store::DendrogramStore;

/// Where a session is in its request loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next request code.
    AwaitingRequest,
    /// Handling a request.
    Processing,
    /// Terminal: the peer asked to close.
    Closed,
}

/// State of one client connection.
///
/// A session owns its dataset and dendrogram; nothing mutable is shared with other
/// sessions.
pub struct Session {
    source: Arc<dyn DataSource>,
    store: Arc<DendrogramStore>,
    max_items: usize,
    state: SessionState,
    table: Option<String>,
    dataset: Option<Arc<Dataset>>,
    dendrogram: Option<Arc<Dendrogram>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("table", &self.table)
            .field("n_examples", &self.dataset.as_ref().map(|d| d.len()))
            .field("depth", &self.dendrogram.as_ref().map(|d| d.depth()))
            .finish_non_exhaustive()
    }
}

/// Run a blocking closure off the async workers and wait for it.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Internal(e.to_string()))?
}

impl Session {
    /// Create a session reading tables from `source` and dendrograms from `store`.
    pub fn new(source: Arc<dyn DataSource>, store: Arc<DendrogramStore>) -> Self {
        Self {
            source,
            store,
            max_items: DEFAULT_MAX_ITEMS,
            state: SessionState::AwaitingRequest,
            table: None,
            dataset: None,
            dendrogram: None,
        }
    }

    /// Set the upper bound on counts and string lengths read from the peer.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The loaded dataset, if any.
    pub fn dataset(&self) -> Option<&Arc<Dataset>> {
        self.dataset.as_ref()
    }

    /// The most recently mined or loaded dendrogram, if any.
    pub fn dendrogram(&self) -> Option<&Arc<Dendrogram>> {
        self.dendrogram.as_ref()
    }

    fn require_dataset(&self) -> Result<Arc<Dataset>> {
        self.dataset.clone().ok_or(Error::NoDataset)
    }

    /// Handle one request and produce its reply.
    ///
    /// Failures are returned, not sent; [`Session::run`] turns them into error
    /// responses and keeps the session open.
    pub async fn handle(&mut self, request: Request) -> Result<Reply> {
        match request {
            Request::LoadDataset { table } => self.load_dataset(table).await,
            Request::Mine { depth, linkage } => self.mine(depth, linkage).await,
            Request::LoadDendrogram { name } => self.load_dendrogram(name).await,
            Request::FetchExamples { indices } => {
                let data = self.require_dataset()?;
                let indices: Vec<i64> = indices.into_iter().map(i64::from).collect();
                Ok(Reply::Examples(data.select(&indices)?))
            }
            Request::ListLinkages => Ok(Reply::Linkages(Linkage::ALL.to_vec())),
            Request::Close => {
                self.state = SessionState::Closed;
                Ok(Reply::Ack)
            }
            Request::SaveDendrogram { name } => self.save_dendrogram(name).await,
            Request::Unknown(code) => Err(Error::Protocol(format!("unknown request code {code}"))),
            Request::Malformed { code, reason } => {
                Err(Error::Protocol(format!("request {code}: {reason}")))
            }
        }
    }

    async fn load_dataset(&mut self, table: String) -> Result<Reply> {
        // The previous dataset and anything derived from it go away even if the load fails.
        self.dataset = None;
        self.dendrogram = None;
        self.table = None;

        let source = Arc::clone(&self.source);
        let name = table.clone();
        let data = blocking(move || {
            source
                .fetch(&name)
                .map_err(|source| Error::NoData { table: name, source })
        })
        .await?;

        let n = data.len();
        info!(table = %table, n_examples = n, "dataset loaded");
        self.dataset = Some(Arc::new(data));
        self.table = Some(table);
        Ok(Reply::Count(n))
    }

    async fn mine(&mut self, depth: i32, linkage: i32) -> Result<Reply> {
        let data = self.require_dataset()?;
        let linkage = Linkage::from_id(linkage)?;
        let depth = usize::try_from(depth).map_err(|_| Error::InvalidDepth {
            requested: i64::from(depth),
            n_items: data.len(),
        })?;

        let miner = Agglomerative::new(linkage);
        let dendrogram = blocking(move || miner.mine(&data, depth)).await?;

        info!(depth, linkage = %linkage, "dendrogram mined");
        let dendrogram = Arc::new(dendrogram);
        self.dendrogram = Some(Arc::clone(&dendrogram));
        Ok(Reply::Dendrogram(dendrogram))
    }

    async fn load_dendrogram(&mut self, name: String) -> Result<Reply> {
        let data = self.require_dataset()?;
        let store = Arc::clone(&self.store);
        let file = name.clone();
        let dendrogram = blocking(move || {
            let d = store.load(&file)?;
            d.validate(data.len())?;
            Ok(d)
        })
        .await?;

        info!(name = %name, depth = dendrogram.depth(), "dendrogram loaded");
        let dendrogram = Arc::new(dendrogram);
        self.dendrogram = Some(Arc::clone(&dendrogram));
        Ok(Reply::Dendrogram(dendrogram))
    }

    async fn save_dendrogram(&mut self, name: String) -> Result<Reply> {
        let dendrogram = self.dendrogram.clone().ok_or(Error::NoDendrogram)?;
        let store = Arc::clone(&self.store);
        let path = blocking(move || store.save(&name, &dendrogram)).await?;
        info!(path = %path.display(), "dendrogram saved");
        Ok(Reply::Ack)
    }

    /// Serve requests from `stream` until the peer closes the session.
    ///
    /// Returns `Ok(())` after a close request or when the peer disconnects between
    /// requests. Transport failures are returned. A request whose framing cannot be
    /// decoded is answered with an error and then ends the session, since the position
    /// of the next request in the stream is unknown. A fully read but malformed payload
    /// only fails that request.
    pub async fn run<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (rd, wr) = tokio::io::split(stream);
        let mut reader = AsyncWireReader::new(BufReader::new(rd)).with_max_items(self.max_items);
        let mut writer = BufWriter::new(wr);

        loop {
            self.state = SessionState::AwaitingRequest;
            let request = match Request::read_from(&mut reader).await {
                Ok(request) => request,
                Err(e) if e.is_disconnect() => {
                    debug!("peer disconnected");
                    return Ok(());
                }
                Err(e) if e.is_transport() => return Err(e),
                Err(e) => {
                    warn!(error = %e, "undecodable request, closing session");
                    writer.write_all(&encode_response(&Err(e))).await?;
                    writer.flush().await?;
                    return Ok(());
                }
            };

            self.state = SessionState::Processing;
            let code = request.code();
            debug!(code, "request");
            let outcome = self.handle(request).await;
            if let Err(e) = &outcome {
                debug!(code, error = %e.flatten(), "request failed");
            }

            writer.write_all(&encode_response(&outcome)).await?;
            writer.flush().await?;

            if self.state == SessionState::Closed {
                debug!("session closed by peer");
                return Ok(());
            }
        }
    }
}
