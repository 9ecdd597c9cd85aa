//! The session protocol.
//!
//! A client opens a TCP connection and sends requests one at a time; each request is
//! answered completely before the next one is read.
//!
//! # Requests
//!
//! | Code | Request | Payload |
//! |------|---------|---------|
//! | 0 | load dataset | string table |
//! | 1 | mine dendrogram | int depth, int distance method id |
//! | 2 | load stored dendrogram | string name |
//! | 3 | fetch examples | int count, then that many int indices |
//! | 4 | list distance methods | — |
//! | 5 | close session | — |
//! | 6 | store current dendrogram | string name |
//!
//! # Responses
//!
//! An int status, `0` for success or `1` for error. Success is followed by the
//! request's payload (example count, dendrogram, `count + examples`,
//! `count + (id, name)` pairs, or nothing for acknowledgements). Error is followed
//! by a string message.
//!
//! Primitive and composite encodings are those of [`crate::codec`].

mod client;
mod server;
mod session;

pub use client::Client;
pub use server::Server;
pub use session::{Session, SessionState};

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::cluster::{Dendrogram, Linkage};
use crate::codec::{self, Encode, WireWriter, DEFAULT_MAX_ITEMS};
use crate::data::Example;
use crate::error::{Error, Result};

/// Response status for a successful request.
pub const STATUS_OK: i32 = 0;
/// Response status for a failed request.
pub const STATUS_ERROR: i32 = 1;

/// A request read from a client.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Load the named table, replacing the session's dataset.
    LoadDataset {
        /// Table name.
        table: String,
    },
    /// Cluster the loaded dataset.
    Mine {
        /// Number of levels requested.
        depth: i32,
        /// Distance method id (see [`Linkage::id`]).
        linkage: i32,
    },
    /// Load a stored dendrogram.
    LoadDendrogram {
        /// Stored name.
        name: String,
    },
    /// Fetch examples of the loaded dataset.
    FetchExamples {
        /// Example indices, answered in this order.
        indices: Vec<i32>,
    },
    /// List the supported distance methods.
    ListLinkages,
    /// End the session.
    Close,
    /// Store the session's current dendrogram.
    SaveDendrogram {
        /// Name to store under.
        name: String,
    },
    /// A request code this server does not know.
    Unknown(i32),
    /// A request whose payload was read in full but does not decode.
    ///
    /// The stream is still in step, so the session answers with an error and goes on.
    Malformed {
        /// Wire code of the request.
        code: i32,
        /// Why the payload was rejected.
        reason: String,
    },
}

impl Request {
    /// Wire code of the request.
    pub fn code(&self) -> i32 {
        match self {
            Request::LoadDataset { .. } => 0,
            Request::Mine { .. } => 1,
            Request::LoadDendrogram { .. } => 2,
            Request::FetchExamples { .. } => 3,
            Request::ListLinkages => 4,
            Request::Close => 5,
            Request::SaveDendrogram { .. } => 6,
            Request::Unknown(code) | Request::Malformed { code, .. } => *code,
        }
    }

    /// Read one request from an async stream.
    ///
    /// Errors mean the stream can no longer be trusted: a transport failure or framing
    /// (a bad count) that leaves the position of the next request unknown. A payload
    /// that was consumed but does not decode comes back as [`Request::Malformed`].
    pub async fn read_from<R: AsyncRead + Unpin>(r: &mut AsyncWireReader<R>) -> Result<Self> {
        let code = r.read_int().await?;
        let request = match code {
            0 => text_request(code, &r.read_string_bytes().await?, |table| {
                Request::LoadDataset { table }
            }),
            1 => Request::Mine {
                depth: r.read_int().await?,
                linkage: r.read_int().await?,
            },
            2 => text_request(code, &r.read_string_bytes().await?, |name| {
                Request::LoadDendrogram { name }
            }),
            3 => {
                let n = r.read_count().await?;
                let mut indices = Vec::with_capacity(n);
                for _ in 0..n {
                    indices.push(r.read_int().await?);
                }
                Request::FetchExamples { indices }
            }
            4 => Request::ListLinkages,
            5 => Request::Close,
            6 => text_request(code, &r.read_string_bytes().await?, |name| {
                Request::SaveDendrogram { name }
            }),
            other => Request::Unknown(other),
        };
        Ok(request)
    }
}

impl Encode for Request {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_int(self.code())?;
        match self {
            Request::LoadDataset { table } => w.write_string(table),
            Request::Mine { depth, linkage } => {
                w.write_int(*depth)?;
                w.write_int(*linkage)
            }
            Request::LoadDendrogram { name } | Request::SaveDendrogram { name } => {
                w.write_string(name)
            }
            Request::FetchExamples { indices } => {
                w.write_count(indices.len())?;
                for &i in indices {
                    w.write_int(i)?;
                }
                Ok(())
            }
            Request::ListLinkages | Request::Close | Request::Unknown(_) => Ok(()),
            Request::Malformed { code, .. } => Err(Error::Protocol(format!(
                "malformed request {code} cannot be encoded"
            ))),
        }
    }
}

fn text_request(code: i32, bytes: &[u8], build: impl FnOnce(String) -> Request) -> Request {
    match codec::utf16_from_be_bytes(bytes) {
        Ok(text) => build(text),
        Err(Error::Protocol(reason)) => Request::Malformed { code, reason },
        Err(e) => Request::Malformed {
            code,
            reason: e.to_string(),
        },
    }
}

/// Successful outcome of a request.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Number of examples loaded.
    Count(usize),
    /// A mined or loaded dendrogram.
    Dendrogram(Arc<Dendrogram>),
    /// Requested examples, in request order.
    Examples(Vec<Example>),
    /// Supported distance methods.
    Linkages(Vec<Linkage>),
    /// Acknowledgement with no payload.
    Ack,
}

impl Encode for Reply {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_int(STATUS_OK)?;
        match self {
            Reply::Count(n) => w.write_count(*n),
            Reply::Dendrogram(d) => w.write(&**d),
            Reply::Examples(examples) => {
                w.write_count(examples.len())?;
                for e in examples {
                    w.write(e)?;
                }
                Ok(())
            }
            Reply::Linkages(linkages) => {
                w.write_count(linkages.len())?;
                for l in linkages {
                    w.write_int(l.id())?;
                    w.write_string(l.name())?;
                }
                Ok(())
            }
            Reply::Ack => Ok(()),
        }
    }
}

/// Encode the response envelope for `outcome`.
///
/// Errors are sent as their flattened cause chain. If the success payload itself
/// cannot be encoded, that failure is sent instead.
pub fn encode_response(outcome: &Result<Reply>) -> Vec<u8> {
    let encoded = match outcome {
        Ok(reply) => codec::to_bytes(reply),
        Err(e) => encode_error(&e.flatten()),
    };
    encoded
        .or_else(|e| encode_error(&e.flatten()))
        .unwrap_or_else(|_| STATUS_ERROR.to_be_bytes().to_vec())
}

fn encode_error(message: &str) -> Result<Vec<u8>> {
    let mut w = WireWriter::new(Vec::new());
    w.write_int(STATUS_ERROR)?;
    w.write_string(message)?;
    Ok(w.into_inner())
}

/// Async counterpart of [`codec::WireReader`] for the primitives requests use.
#[derive(Debug)]
pub struct AsyncWireReader<R> {
    inner: R,
    max_items: usize,
}

impl<R: AsyncRead + Unpin> AsyncWireReader<R> {
    /// Wrap an async byte source with the default item limit.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Set the upper bound on decoded counts and string lengths.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Read a big-endian 4-byte signed integer.
    pub async fn read_int(&mut self) -> Result<i32> {
        Ok(self.inner.read_i32().await?)
    }

    /// Read a count, rejecting negative values and values above the item limit.
    pub async fn read_count(&mut self) -> Result<usize> {
        let v = self.read_int().await?;
        codec::check_count(v, self.max_items)
    }

    /// Read a UTF-16 string.
    pub async fn read_string(&mut self) -> Result<String> {
        let buf = self.read_string_bytes().await?;
        codec::utf16_from_be_bytes(&buf)
    }

    /// Read the raw big-endian code units of a string without decoding them.
    pub async fn read_string_bytes(&mut self) -> Result<Vec<u8>> {
        let n = self.read_count().await?;
        let mut buf = vec![0u8; n * 2];
        self.inner.read_exact(&mut buf).await?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WireReader;

    async fn decode(bytes: Vec<u8>) -> Result<Request> {
        let mut r = AsyncWireReader::new(bytes.as_slice());
        Request::read_from(&mut r).await
    }

    #[tokio::test]
    async fn test_requests_decode_what_clients_encode() {
        let requests = vec![
            Request::LoadDataset {
                table: "iris".into(),
            },
            Request::Mine {
                depth: 3,
                linkage: 5,
            },
            Request::LoadDendrogram { name: "d".into() },
            Request::FetchExamples {
                indices: vec![2, -1, 0],
            },
            Request::ListLinkages,
            Request::Close,
            Request::SaveDendrogram { name: "s".into() },
            Request::Unknown(42),
        ];
        for req in requests {
            let bytes = codec::to_bytes(&req).unwrap();
            assert_eq!(decode(bytes).await.unwrap(), req);
        }
    }

    #[tokio::test]
    async fn test_negative_count_is_protocol_error() {
        let mut bytes = 3i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&(-4i32).to_be_bytes());
        assert!(matches!(decode(bytes).await, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf16_payload_is_consumed() {
        let mut bytes = 0i32.to_be_bytes().to_vec();
        bytes.extend_from_slice(&1i32.to_be_bytes());
        bytes.extend_from_slice(&[0xD8, 0x00]);
        bytes.extend_from_slice(&4i32.to_be_bytes());

        let mut r = AsyncWireReader::new(bytes.as_slice());
        match Request::read_from(&mut r).await.unwrap() {
            Request::Malformed { code, reason } => {
                assert_eq!(code, 0);
                assert_eq!(reason, "string is not valid UTF-16");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(Request::read_from(&mut r).await.unwrap(), Request::ListLinkages);
    }

    #[test]
    fn test_malformed_request_is_not_encodable() {
        let req = Request::Malformed {
            code: 2,
            reason: "bad".into(),
        };
        assert!(matches!(codec::to_bytes(&req), Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_empty_stream_is_disconnect() {
        assert!(decode(Vec::new()).await.unwrap_err().is_disconnect());
    }

    #[test]
    fn test_error_envelope() {
        let bytes = encode_response(&Err(Error::NoDataset));
        let mut r = WireReader::new(bytes.as_slice());
        assert_eq!(r.read_int().unwrap(), STATUS_ERROR);
        assert_eq!(r.read_string().unwrap(), "no dataset loaded");
    }

    #[test]
    fn test_linkage_list_envelope() {
        let bytes = encode_response(&Ok(Reply::Linkages(vec![Linkage::Ward])));
        let mut r = WireReader::new(bytes.as_slice());
        assert_eq!(r.read_int().unwrap(), STATUS_OK);
        assert_eq!(r.read_count().unwrap(), 1);
        assert_eq!(r.read_int().unwrap(), 5);
        assert_eq!(r.read_string().unwrap(), "ward-link");
    }
}
