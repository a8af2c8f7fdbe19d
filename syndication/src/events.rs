use syndication_core::{SyndicationEvent, SyndicationHooks};
use tracing::{info, warn};

/// Hooks that only log syndication events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TraceEvents;

impl SyndicationHooks for TraceEvents {
    fn notify(&self, event: &SyndicationEvent) {
        match event {
            SyndicationEvent::PullFailure { .. }
            | SyndicationEvent::PushFailure { .. }
            | SyndicationEvent::SiteDisabled { .. } => {
                warn!(event = event.name(), site_id = event.site_id(), ?event, "Syndication event")
            }
            _ => info!(event = event.name(), site_id = event.site_id(), ?event, "Syndication event"),
        }
    }
}
