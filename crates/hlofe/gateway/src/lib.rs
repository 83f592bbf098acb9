//! HLO-FE Gateway - Access to the NGSI-LD entity store
//!
//! This crate provides the store contract and its implementations:
//!
//! - **EntityGateway**: Query, create, patch and delete entities
//! - **NgsiLdClient**: REST client for an NGSI-LD context broker
//! - **InMemoryEntityStore**: Broker stand-in for development and tests
//! - **TokenProvider**: Bearer tokens for the broker
//! - **DomainResolver**: Lookup of the locally registered domain

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod domain;
pub mod error;
pub mod gateway;
pub mod http;
pub mod memory;
pub mod query;
pub mod token;

// Re-exports
pub use domain::{DomainResolver, FixedDomain, StoreDomainResolver};
pub use error::{GatewayError, Result};
pub use gateway::{fetch_components, fetch_service, query_all, CreateOutcome, EntityGateway, PAGE_SIZE};
pub use http::{ClientSettings, NgsiLdClient};
pub use memory::{InMemoryEntityStore, Mutation};
pub use query::QueryParams;
pub use token::{NoToken, ShimTokenProvider, StaticToken, TokenProvider};
