//! Client-side search stack.
//!
//! Everything a host application needs to put a search box in front of
//! the backing index:
//!
//! - [`models`]: queries, facet selections, results and counts
//! - [`codec`]: lossless URL-fragment encoding of search state
//! - [`compiler`]: query sanitization and compilation into backend
//!   request bodies, fingerprinted for caching and correlation
//! - [`cache`]: TTL result caches with single-flight fetching
//! - [`channel`]: the authenticated WebSocket connection that
//!   multiplexes requests to the search backend
//! - [`proxy`]: the orchestrating surface tying all of the above
//!   together
//!
//! Construction starts from [`Config::load`], which layers the bundled
//! defaults, an optional config file and `SEARCHBOX_`-prefixed
//! environment variables.

pub mod aggregations;
pub mod backend;
pub mod cache;
pub mod channel;
pub mod codec;
pub mod compiler;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

pub use backend::{NodeBackend, SearchBackend};
pub use channel::{Channel, ChannelState};
pub use compiler::QueryCompiler;
pub use config::Config;
pub use error::{Error, Result};
pub use models::{Filters, Pager, Query, SearchResults, Suggestions};
pub use proxy::{MemoryStateSink, SearchOptions, SearchProxy, SearchState, StateSink};
