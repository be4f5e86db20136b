//! Fire-and-forget fan-out of coordinator pushes to attached views.
//!
//! Delivery is at-most-once: a push is offered to every matching recipient
//! once, and a recipient whose receiver has gone away is silently dropped
//! from the registry.

use crate::config::url_origin;
use crate::messages::Push;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub type RecipientId = u64;

/// Where a recipient lives, which decides whether it is eligible for a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientKind {
    /// Extension-owned view such as the popup or the CLI. Always eligible.
    ExtensionPage,
    /// A page showing `url`. Eligible only while on the configured GitLab origin.
    Tab { url: String },
}

struct Recipient {
    id: RecipientId,
    kind: RecipientKind,
    sender: UnboundedSender<Push>,
}

#[derive(Default)]
struct Registry {
    next_id: RecipientId,
    recipients: Vec<Recipient>,
}

#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Mutex<Registry>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a recipient and returns the receiving end of its channel.
    pub fn attach(&self, kind: RecipientKind) -> (RecipientId, UnboundedReceiver<Push>) {
        let (sender, receiver) = unbounded_channel();
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = registry.next_id;
        registry.recipients.push(Recipient { id, kind, sender });
        (id, receiver)
    }

    pub fn detach(&self, id: RecipientId) {
        self.registry().recipients.retain(|recipient| recipient.id != id);
    }

    /// Records that a tab recipient moved to another URL.
    pub fn navigate(&self, id: RecipientId, url: impl Into<String>) {
        let url = url.into();
        if let Some(recipient) = self
            .registry()
            .recipients
            .iter_mut()
            .find(|recipient| recipient.id == id)
        {
            if let RecipientKind::Tab { url: current } = &mut recipient.kind {
                *current = url;
            }
        }
    }

    pub fn recipient_count(&self) -> usize {
        self.registry().recipients.len()
    }

    /// Offers `push` to every eligible recipient and returns how many accepted it.
    pub fn broadcast(&self, push: &Push, gitlab_url: Option<&str>) -> usize {
        let origin = gitlab_url.and_then(url_origin);
        let mut delivered = 0;
        let mut registry = self.registry();
        registry.recipients.retain(|recipient| {
            if !is_eligible(&recipient.kind, origin.as_deref()) {
                return true;
            }
            match recipient.sender.send(push.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    debug!("Dropping closed recipient {}", recipient.id);
                    false
                }
            }
        });
        delivered
    }
}

fn is_eligible(kind: &RecipientKind, gitlab_origin: Option<&str>) -> bool {
    match kind {
        RecipientKind::ExtensionPage => true,
        RecipientKind::Tab { url } => match (gitlab_origin, url_origin(url)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        },
    }
}
