//! Creates or updates the single wiki page a run produces.

use crate::confluence::{RemoteDocument, WikiApi};
use crate::error::Result;
use crate::title::{generate_variants, normalize};
use tracing::{debug, info, instrument};

/// What a publish call did to the wiki.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new page was created.
    Created(RemoteDocument),

    /// An existing page was replaced.
    Updated {
        /// The page after the update
        page: RemoteDocument,
        /// Version the page had before the update
        previous_version: u64,
    },
}

impl PublishOutcome {
    /// Returns the page that was created or updated.
    #[must_use]
    pub const fn page(&self) -> &RemoteDocument {
        match self {
            Self::Created(page) | Self::Updated { page, .. } => page,
        }
    }
}

/// Creates or updates exactly one wiki page per call.
pub struct Publisher<'a, W: WikiApi> {
    wiki: &'a W,
}

impl<'a, W: WikiApi> Publisher<'a, W> {
    /// Creates a publisher over a wiki client.
    pub const fn new(wiki: &'a W) -> Self {
        Self { wiki }
    }

    /// Finds the page already holding the document titled `title`.
    ///
    /// Every spelling variant is searched in order. A page whose title equals
    /// a variant exactly wins over one that only matches after
    /// normalization; among equals the earlier variant wins.
    ///
    /// # Errors
    ///
    /// Returns an error if a search call fails.
    pub fn find_existing(&self, title: &str) -> Result<Option<RemoteDocument>> {
        let mut normalized_hit: Option<RemoteDocument> = None;

        for variant in generate_variants(title) {
            let pages = self.wiki.search_pages(&variant)?;
            debug!("Variant '{}' returned {} page(s)", variant, pages.len());

            if let Some(page) = pages.iter().find(|p| p.title == variant) {
                return Ok(Some(page.clone()));
            }

            if normalized_hit.is_none() {
                let key = normalize(&variant);
                normalized_hit = pages.into_iter().find(|p| normalize(&p.title) == key);
            }
        }

        Ok(normalized_hit)
    }

    /// Publishes `body` under `title`.
    ///
    /// Updates use the version read immediately before the write plus one.
    /// A rejected update is returned as is.
    ///
    /// # Errors
    ///
    /// Returns an error if any wiki call fails.
    #[instrument(skip(self, body), fields(body_chars = body.len()))]
    pub fn publish(&self, title: &str, body: &str) -> Result<PublishOutcome> {
        match self.find_existing(title)? {
            None => {
                info!("No existing page found, creating '{}'", title);
                let page = self.wiki.create_page(title, body)?;
                Ok(PublishOutcome::Created(page))
            }
            Some(existing) => {
                info!("Found existing page '{}' (id {})", existing.title, existing.id);
                let current = self.wiki.get_page(&existing.id)?;
                let next = current.version + 1;
                let page = self.wiki.update_page(&current.id, title, body, next)?;
                info!("Updated page {}: version {} -> {}", page.id, current.version, next);
                Ok(PublishOutcome::Updated {
                    page,
                    previous_version: current.version,
                })
            }
        }
    }
}
