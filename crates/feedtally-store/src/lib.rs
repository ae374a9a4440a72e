//! feedtally-store: everything that talks to the remote artifact and
//! tabular store.
//!
//! The store is a pair of web apps speaking JSON over `POST` (see
//! [`protocol`]). [`StoreClient`] owns the transport and the retry policy;
//! [`discovery`], [`fetcher`], [`directory`] and [`publisher`] build the
//! pipeline stages on top of it.

pub mod backoff;
pub mod client;
pub mod decode;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod protocol;
pub mod publisher;
pub mod transport;

pub use backoff::{Backoff, RetryPolicy};
pub use client::{Endpoint, StoreClient};
pub use directory::PartnerSource;
pub use discovery::discover;
pub use error::StoreError;
pub use fetcher::{BatchFetcher, FetchError, FetchOutcome, FetchSettings};
pub use protocol::Table;
pub use publisher::{PublishError, PublishReport, PublishSettings, Publisher};
pub use transport::{RawResponse, ReqwestTransport, Transport, TransportSettings};
