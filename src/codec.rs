//! Binary encoding shared by the wire protocol and dendrogram files.
//!
//! # Layout
//!
//! Big-endian throughout, every variable-length item prefixed by an explicit count:
//!
//! | Item | Encoding |
//! |------|----------|
//! | integer | 4-byte signed |
//! | real | 8-byte IEEE-754 double |
//! | string | int count of UTF-16 code units, then the units (2 bytes each) |
//! | [`Example`] | int count, then that many reals |
//! | [`Cluster`] | int count, then the member indices in ascending order |
//! | [`ClusterSet`] | int count, then that many clusters |
//! | [`Dendrogram`] | int depth, then that many cluster sets, level 0 first |
//!
//! Decoding rejects negative counts and indices, counts above the reader's item limit,
//! and strings that are not valid UTF-16.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::sync::Arc;

use crate::cluster::{Cluster, ClusterSet, Dendrogram};
use crate::data::Example;
use crate::error::{Error, Result};

/// Default upper bound on any decoded count or string length.
pub const DEFAULT_MAX_ITEMS: usize = 1 << 20;

/// Something that can be written in the binary layout.
pub trait Encode {
    /// Write `self` to `w`.
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()>;
}

/// Something that can be read back from the binary layout.
pub trait Decode: Sized {
    /// Read one value from `r`.
    fn decode<R: Read>(r: &mut WireReader<R>) -> Result<Self>;
}

/// Writes primitives in the binary layout.
#[derive(Debug)]
pub struct WireWriter<W> {
    inner: W,
}

impl<W: Write> WireWriter<W> {
    /// Wrap a byte sink.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write a 4-byte signed integer.
    pub fn write_int(&mut self, v: i32) -> Result<()> {
        self.inner.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Write an 8-byte double.
    pub fn write_real(&mut self, v: f64) -> Result<()> {
        self.inner.write_all(&v.to_be_bytes())?;
        Ok(())
    }

    /// Write a non-negative count or index as an integer.
    pub fn write_count(&mut self, n: usize) -> Result<()> {
        let v = i32::try_from(n)
            .map_err(|_| Error::Protocol(format!("count {n} does not fit in a 4-byte integer")))?;
        self.write_int(v)
    }

    /// Write a string as UTF-16 code units.
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let units: Vec<u16> = s.encode_utf16().collect();
        self.write_count(units.len())?;
        let mut buf = Vec::with_capacity(units.len() * 2);
        for u in units {
            buf.extend_from_slice(&u.to_be_bytes());
        }
        self.inner.write_all(&buf)?;
        Ok(())
    }

    /// Write any encodable value.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Mutable access to the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Unwrap the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads primitives in the binary layout.
#[derive(Debug)]
pub struct WireReader<R> {
    inner: R,
    max_items: usize,
}

impl<R: Read> WireReader<R> {
    /// Wrap a byte source with the default item limit.
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

    /// Read a 4-byte signed integer.
    pub fn read_int(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.inner.read_exact(&mut buf)?;
        Ok(i32::from_be_bytes(buf))
    }

    /// Read an 8-byte double.
    pub fn read_real(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.inner.read_exact(&mut buf)?;
        Ok(f64::from_be_bytes(buf))
    }

    /// Read a count, rejecting negative values and values above the item limit.
    pub fn read_count(&mut self) -> Result<usize> {
        let v = self.read_int()?;
        check_count(v, self.max_items)
    }

    /// Read a non-negative index.
    pub fn read_index(&mut self) -> Result<usize> {
        let v = self.read_int()?;
        usize::try_from(v).map_err(|_| Error::Protocol(format!("negative index {v}")))
    }

    /// Read a UTF-16 string.
    pub fn read_string(&mut self) -> Result<String> {
        let n = self.read_count()?;
        let mut buf = vec![0u8; n * 2];
        self.inner.read_exact(&mut buf)?;
        utf16_from_be_bytes(&buf)
    }

    /// Read any decodable value.
    pub fn read<T: Decode>(&mut self) -> Result<T> {
        T::decode(self)
    }

    /// Mutable access to the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Unwrap the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

pub(crate) fn check_count(v: i32, max_items: usize) -> Result<usize> {
    let n = usize::try_from(v).map_err(|_| Error::Protocol(format!("negative count {v}")))?;
    if n > max_items {
        return Err(Error::Protocol(format!(
            "count {n} exceeds the limit of {max_items}"
        )));
    }
    Ok(n)
}

pub(crate) fn utf16_from_be_bytes(buf: &[u8]) -> Result<String> {
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::Protocol("string is not valid UTF-16".into()))
}

impl Encode for str {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_string(self)
    }
}

impl Encode for Example {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_count(self.len())?;
        for &v in self.values() {
            w.write_real(v)?;
        }
        Ok(())
    }
}

impl Decode for Example {
    fn decode<R: Read>(r: &mut WireReader<R>) -> Result<Self> {
        let n = r.read_count()?;
        let values = (0..n).map(|_| r.read_real()).collect::<Result<Vec<_>>>()?;
        Ok(Example::new(values))
    }
}

impl Encode for Cluster {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_count(self.len())?;
        for i in self.iter() {
            w.write_count(i)?;
        }
        Ok(())
    }
}

impl Decode for Cluster {
    fn decode<R: Read>(r: &mut WireReader<R>) -> Result<Self> {
        let n = r.read_count()?;
        let mut cluster = Cluster::new();
        for _ in 0..n {
            cluster.add(r.read_index()?);
        }
        if cluster.len() != n {
            return Err(Error::Protocol("duplicate index in cluster".into()));
        }
        Ok(cluster)
    }
}

impl Encode for ClusterSet {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_count(self.len())?;
        for cluster in self {
            w.write(&**cluster)?;
        }
        Ok(())
    }
}

impl Decode for ClusterSet {
    fn decode<R: Read>(r: &mut WireReader<R>) -> Result<Self> {
        decode_level(r, None)
    }
}

/// Decode one level. Clusters equal to one in `previous` reuse that object, which
/// restores the sharing a freshly mined dendrogram has between levels.
fn decode_level<R: Read>(
    r: &mut WireReader<R>,
    previous: Option<&HashSet<Arc<Cluster>>>,
) -> Result<ClusterSet> {
    let n = r.read_count()?;
    let mut set = ClusterSet::with_capacity(n);
    for _ in 0..n {
        let cluster = Cluster::decode(r)?;
        let shared = previous
            .and_then(|prev| prev.get(&cluster))
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(cluster));
        set.add(shared)?;
    }
    if set.len() != n {
        return Err(Error::Protocol("repeated cluster within a level".into()));
    }
    Ok(set)
}

impl Encode for Dendrogram {
    fn encode<W: Write>(&self, w: &mut WireWriter<W>) -> Result<()> {
        w.write_count(self.depth())?;
        for level in self {
            w.write(level)?;
        }
        Ok(())
    }
}

impl Decode for Dendrogram {
    fn decode<R: Read>(r: &mut WireReader<R>) -> Result<Self> {
        let depth = r.read_count()?;
        if depth == 0 {
            return Err(Error::Protocol("dendrogram has no levels".into()));
        }

        let mut levels: Vec<ClusterSet> = Vec::with_capacity(depth);
        let mut previous: Option<HashSet<Arc<Cluster>>> = None;
        for _ in 0..depth {
            let level = decode_level(r, previous.as_ref())?;
            previous = Some(level.iter().cloned().collect());
            levels.push(level);
        }
        Ok(Dendrogram::from_levels(levels))
    }
}

/// Encode `value` into a fresh buffer.
pub fn to_bytes<T: Encode + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut w = WireWriter::new(Vec::new());
    w.write(value)?;
    Ok(w.into_inner())
}

/// Decode a `T` from the start of `bytes`.
pub fn from_bytes<T: Decode>(bytes: &[u8]) -> Result<T> {
    WireReader::new(bytes).read()
}
