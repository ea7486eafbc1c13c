pub mod client;
pub mod config;
pub mod data_sources;
mod provider;
pub mod resources;
pub mod util;

#[cfg(test)]
mod testing;

pub use client::VcfaClient;
pub use config::{ClientConfig, ProviderConfig};
pub use provider::{SharedClient, VcfaProvider};
pub use resources::{OrgLocalUserResource, OrgResource};
