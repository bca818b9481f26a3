pub mod bundle;
pub mod cache;
pub mod classify;
pub mod compress;
pub mod config;
pub mod exception;
pub mod fingerprint;
pub mod lookup;
pub mod param;
pub mod request;
pub mod response;
pub mod server;
pub mod util;

pub use cache::CacheDecision;
pub use classify::{BundleKind, Target};
pub use config::Config;
pub use exception::Exception;
pub use fingerprint::{AggregateDescriptor, Fingerprint};
pub use lookup::FileDescriptor;
pub use request::Request;
pub use response::Response;
pub use server::{handle_connection, resolve, run, RequestOutcome};
