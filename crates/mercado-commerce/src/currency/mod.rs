//! USD→VES exchange rates: snapshots, providers, and the service that
//! keeps the current one.

mod provider;
mod rate;
mod service;

pub use provider::*;
pub use rate::*;
pub use service::*;
