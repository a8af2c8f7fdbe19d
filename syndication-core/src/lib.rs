#![doc = "syndication-core: transports, factory and pull/push orchestration for post syndication."]

//! This crate contains the syndication logic shared by the CLI and by tests:
//! the transport contract, the XML-RPC, REST and RSS transports, the factory
//! that builds a transport for a configured site, credential sealing, and the
//! orchestrator that reconciles pulled posts into the local store.
//!
//! The host content system is represented by the traits in [`store`],
//! [`site`] and [`hooks`]; in-memory implementations are provided for each.

pub mod config;
pub mod contract;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod post;
pub mod site;
pub mod store;
pub mod syndicate;
pub mod transport;
pub mod wire;

pub use config::Settings;
pub use contract::{ClientData, HostContext, Mode, Outcome, PullArgs, PullTransport, PushTransport, Transport};
pub use credentials::{CredentialCipher, CredentialError, SiteCredentials};
pub use error::TransportError;
pub use factory::{TransportDescriptor, TransportFactory};
pub use hooks::{NoHooks, SyndicationEvent, SyndicationHooks, Verdict};
pub use post::{LocalPost, Post, PostData};
pub use site::{ImportDefaults, MemorySiteRepository, SiteConfig, SiteRepository, SiteState};
pub use store::{MemoryStore, PostStore, StoreError, TermStore};
pub use syndicate::{PullReport, PullStatus, PushReport, PushResult, Syndicator};
