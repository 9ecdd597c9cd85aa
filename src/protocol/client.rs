use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use super::{Request, STATUS_ERROR, STATUS_OK};
use crate::cluster::{Dendrogram, Linkage};
use crate::codec::{WireReader, WireWriter};
use crate::data::Example;
use crate::error::{Error, Result};

/// Blocking client for the session protocol.
///
/// ```no_run
/// use dendro::protocol::Client;
/// use dendro::cluster::Linkage;
///
/// let mut client = Client::connect("127.0.0.1:8080").unwrap();
/// let n = client.load_dataset("points").unwrap();
/// let dendrogram = client.mine(n, Linkage::Average).unwrap();
/// println!("{dendrogram}");
/// client.close().unwrap();
/// ```
#[derive(Debug)]
pub struct Client {
    reader: WireReader<BufReader<TcpStream>>,
    writer: WireWriter<BufWriter<TcpStream>>,
}

impl Client {
    /// Connect to a server.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let read_half = stream.try_clone()?;
        Ok(Self {
            reader: WireReader::new(BufReader::new(read_half)),
            writer: WireWriter::new(BufWriter::new(stream)),
        })
    }

    /// Send `request` and read the response status.
    ///
    /// On success the caller reads the payload; an error status becomes
    /// [`Error::Remote`].
    fn call(&mut self, request: &Request) -> Result<()> {
        self.writer.write(request)?;
        self.writer.flush()?;
        match self.reader.read_int()? {
            STATUS_OK => Ok(()),
            STATUS_ERROR => Err(Error::Remote(self.reader.read_string()?)),
            other => Err(Error::Protocol(format!("unknown response status {other}"))),
        }
    }

    fn int_arg(value: usize, what: &str) -> Result<i32> {
        i32::try_from(value).map_err(|_| Error::Protocol(format!("{what} {value} is too large")))
    }

    /// Load `table` on the server; returns its example count.
    pub fn load_dataset(&mut self, table: &str) -> Result<usize> {
        self.call(&Request::LoadDataset {
            table: table.to_string(),
        })?;
        self.reader.read_count()
    }

    /// Cluster the loaded dataset into `depth` levels.
    pub fn mine(&mut self, depth: usize, linkage: Linkage) -> Result<Dendrogram> {
        self.call(&Request::Mine {
            depth: Self::int_arg(depth, "depth")?,
            linkage: linkage.id(),
        })?;
        self.reader.read()
    }

    /// Load a dendrogram stored on the server under `name`.
    pub fn load_dendrogram(&mut self, name: &str) -> Result<Dendrogram> {
        self.call(&Request::LoadDendrogram {
            name: name.to_string(),
        })?;
        self.reader.read()
    }

    /// Store the session's current dendrogram on the server under `name`.
    pub fn save_dendrogram(&mut self, name: &str) -> Result<()> {
        self.call(&Request::SaveDendrogram {
            name: name.to_string(),
        })
    }

    /// Fetch examples of the loaded dataset, in the order of `indices`.
    pub fn fetch_examples(&mut self, indices: &[usize]) -> Result<Vec<Example>> {
        let indices = indices
            .iter()
            .map(|&i| Self::int_arg(i, "index"))
            .collect::<Result<Vec<_>>>()?;
        self.call(&Request::FetchExamples { indices })?;
        let n = self.reader.read_count()?;
        (0..n).map(|_| self.reader.read()).collect()
    }

    /// Distance methods the server supports, as `(id, name)`.
    pub fn linkages(&mut self) -> Result<Vec<(i32, String)>> {
        self.call(&Request::ListLinkages)?;
        let n = self.reader.read_count()?;
        (0..n)
            .map(|_| Ok((self.reader.read_int()?, self.reader.read_string()?)))
            .collect()
    }

    /// End the session.
    pub fn close(mut self) -> Result<()> {
        self.call(&Request::Close)
    }
}
