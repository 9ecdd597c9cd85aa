//! Hierarchical agglomerative clustering.
//!
//! `dendro` builds a dendrogram (one partition of the dataset per merge step) over a
//! fixed in-memory dataset and serves it over a small binary protocol.
//!
//! - [`cluster`]: the data model ([`Cluster`], [`ClusterSet`], [`Dendrogram`]), the
//!   linkage strategies and the merge loop
//! - [`codec`]: the big-endian binary layout shared by the wire and stored files
//! - [`protocol`]: the per-connection session state machine, the server and a client
//! - [`data`]: examples, datasets and the data sources they are loaded from

#![forbid(unsafe_code)]

pub mod cluster;
pub mod codec;
pub mod config;
pub mod data;
pub mod error;
pub mod protocol;
pub mod store;

pub use cluster::{Agglomerative, Cluster, ClusterSet, Dendrogram, Linkage};
pub use config::ServerConfig;
pub use data::{Dataset, Example};
pub use error::{Error, Result};
pub use store::DendrogramStore;
