use std::collections::HashMap;

use uuid::Uuid;

use crate::database::PendingIdentity;
use crate::models::PublisherIdentity;
use crate::registry::RemotePublisher;

/// How a raw contact string is compared against a directory entry's name.
/// Behind a trait: the production matcher is deliberately loose, and callers
/// shouldn't have to change when a stricter one replaces it.
pub trait NameMatcher: Send + Sync {
    fn matches(&self, contact: &str, directory_name: &str) -> bool;
}

/// Case-insensitive bidirectional substring match. Loose on purpose: the
/// directory holds display names of wildly varying shapes.
pub struct SubstringMatcher;

impl NameMatcher for SubstringMatcher {
    fn matches(&self, contact: &str, directory_name: &str) -> bool {
        let a = contact.trim().to_lowercase();
        let b = directory_name.trim().to_lowercase();
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a == b || a.contains(&b) || b.contains(&a)
    }
}

/// Resolves a row's contact string against the remote publisher directory
/// and the locally-pending identities fetched for this batch.
pub struct PublisherResolver {
    directory: Vec<RemotePublisher>,
    email_index: HashMap<String, usize>,
    matcher: Box<dyn NameMatcher>,
}

impl PublisherResolver {
    pub fn new(directory: Vec<RemotePublisher>, matcher: Box<dyn NameMatcher>) -> Self {
        let email_index = directory
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.email.as_ref().map(|e| (e.trim().to_lowercase(), i)))
            .collect();
        Self {
            directory,
            email_index,
            matcher,
        }
    }

    /// Three-way outcome: canonical match, reuse of an existing pending
    /// identity, or a plain contact. Never fails; worst case is Contact.
    pub fn resolve(
        &self,
        contact: Option<&str>,
        pending_by_email: &HashMap<String, PendingIdentity>,
    ) -> PublisherIdentity {
        let contact = match contact.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => c,
            None => return PublisherIdentity::Unknown,
        };

        if contact.contains('@') {
            let email = contact.to_lowercase();

            if let Some(&idx) = self.email_index.get(&email) {
                let publisher = &self.directory[idx];
                return PublisherIdentity::Matched {
                    id: publisher.id.clone(),
                    name: publisher.publisher_name.clone(),
                    email: publisher.email.clone().map(|e| e.to_lowercase()),
                };
            }

            // Same real-world contact may already have a locally-minted
            // identity on another record; reuse it instead of minting a
            // second disconnected one.
            if let Some(pending) = pending_by_email.get(&email) {
                return PublisherIdentity::Pending {
                    local_id: pending.local_id.clone(),
                    name: pending.name.clone(),
                    email: Some(pending.email.to_lowercase()),
                };
            }

            return PublisherIdentity::Contact {
                name: None,
                email: Some(email),
            };
        }

        for publisher in &self.directory {
            if let Some(name) = &publisher.publisher_name {
                if self.matcher.matches(contact, name) {
                    return PublisherIdentity::Matched {
                        id: publisher.id.clone(),
                        name: publisher.publisher_name.clone(),
                        email: publisher.email.clone().map(|e| e.to_lowercase()),
                    };
                }
            }
        }

        PublisherIdentity::Contact {
            name: Some(contact.to_string()),
            email: None,
        }
    }
}

/// Mints the identity the "mark as publisher" action assigns, push-eligible
/// immediately and upgraded later by the sync sweep.
pub fn mint_pending_identity(name: Option<&str>, email: &str) -> PublisherIdentity {
    PublisherIdentity::Pending {
        local_id: format!("pending_{}", Uuid::new_v4().simple()),
        name: name.map(|s| s.to_string()),
        email: Some(email.trim().to_lowercase()),
    }
}
