//! Transport factory: transport-type key -> transport instance for a site.
//!
//! Construction is fail-soft. [`TransportFactory::get_transport`] returns
//! `None` for a missing or disabled site, an unregistered transport type,
//! unreadable credentials, or configuration the transport requires but the
//! site lacks. Capability queries answer from static metadata only.

use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::contract::{ClientData, HostContext, Mode, Transport};
use crate::credentials::SiteCredentials;
use crate::site::{SiteConfig, SiteRepository};
use crate::transport::{rest, rss, xmlrpc, RestTransport, RssTransport, XmlRpcTransport};

/// Builds a transport for a site, or `None` when the site's configuration
/// or credentials are insufficient for this transport type.
pub type BuildFn = Arc<dyn Fn(&SiteConfig, &SiteCredentials, &HostContext) -> Option<Box<dyn Transport>> + Send + Sync>;

#[derive(Clone)]
pub struct TransportDescriptor {
    pub client_data: ClientData,
    pub build: BuildFn,
}

impl TransportDescriptor {
    pub fn new<F>(client_data: ClientData, build: F) -> Self
    where
        F: Fn(&SiteConfig, &SiteCredentials, &HostContext) -> Option<Box<dyn Transport>> + Send + Sync + 'static,
    {
        Self {
            client_data,
            build: Arc::new(build),
        }
    }
}

impl std::fmt::Debug for TransportDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportDescriptor")
            .field("client_data", &self.client_data)
            .finish()
    }
}

pub fn builtin_descriptors() -> [TransportDescriptor; 3] {
    [
        TransportDescriptor::new(xmlrpc::CLIENT_DATA, XmlRpcTransport::build),
        TransportDescriptor::new(rest::CLIENT_DATA, RestTransport::build),
        TransportDescriptor::new(rss::CLIENT_DATA, RssTransport::build),
    ]
}

pub struct TransportFactory {
    registry: BTreeMap<&'static str, TransportDescriptor>,
    sites: Arc<dyn SiteRepository>,
    ctx: HostContext,
}

impl TransportFactory {
    /// Factory with the built-in transports registered.
    pub fn new(sites: Arc<dyn SiteRepository>, ctx: HostContext) -> Self {
        let mut factory = Self::empty(sites, ctx);
        for descriptor in builtin_descriptors() {
            factory.register(descriptor);
        }
        factory
    }

    pub fn empty(sites: Arc<dyn SiteRepository>, ctx: HostContext) -> Self {
        Self {
            registry: BTreeMap::new(),
            sites,
            ctx,
        }
    }

    /// Registers a transport type, replacing any previous one with the same key.
    pub fn register(&mut self, descriptor: TransportDescriptor) {
        self.registry.insert(descriptor.client_data.id, descriptor);
    }

    pub fn client_data(&self, transport_type: &str) -> Option<ClientData> {
        self.registry.get(transport_type).map(|d| d.client_data)
    }

    pub fn registered(&self) -> impl Iterator<Item = ClientData> + '_ {
        self.registry.values().map(|d| d.client_data)
    }

    pub fn supports_push(&self, transport_type: &str) -> bool {
        self.client_data(transport_type).is_some_and(|c| c.supports(Mode::Push))
    }

    pub fn supports_pull(&self, transport_type: &str) -> bool {
        self.client_data(transport_type).is_some_and(|c| c.supports(Mode::Pull))
    }

    pub fn sites(&self) -> &Arc<dyn SiteRepository> {
        &self.sites
    }

    pub fn get_transport(&self, site_id: &str) -> Option<Box<dyn Transport>> {
        let Some(site) = self.sites.get_site(site_id) else {
            debug!(site_id, "No transport: site does not exist");
            return None;
        };
        if !site.enabled {
            debug!(site_id, "No transport: site is disabled");
            return None;
        }
        let Some(descriptor) = self.registry.get(site.transport_type.as_str()) else {
            warn!(site_id, transport = %site.transport_type, "No transport: type is not registered");
            return None;
        };
        let credentials = match self.sites.credentials(site_id) {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(site_id, error = %e, "No transport: credentials unreadable");
                return None;
            }
        };
        (descriptor.build)(&site, &credentials, &self.ctx)
    }
}
