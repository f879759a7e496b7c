//! Satellite image acquisition.
//!
//! - [`naming`]: provider URL / cache file naming
//! - [`remote`]: remote image providers (HTTP and in-memory)
//! - [`acquirer`]: cache-aware probe, download and purge per source
//! - [`sync`]: backward search for a timestamp all sources share

pub mod acquirer;
pub mod naming;
pub mod remote;
pub mod sync;

pub use acquirer::{Acquirer, AcquisitionState};
pub use naming::{resolve_name, ResolvedName};
pub use remote::{Credentials, HttpRemote, MemoryRemote, RemoteError, RemoteImageSource};
pub use sync::{SyncOutcome, SyncPolicy, TimeSynchronizer};
