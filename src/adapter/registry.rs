//! URL to adapter dispatch. Host-exact matching against an ordered, static signature table.

use crate::adapter::error::RetrievalError;
use crate::adapter::SiteAdapter;
use crate::model::{Site, StoryReference};
use reqwest::Url;

/// A site and the registrable domain its URLs live on.
#[derive(Debug, Clone, Copy)]
pub struct SiteSignature {
    pub site: Site,
    pub domain: &'static str,
}

/// Ordered signature table; first match wins. Domains must not overlap.
pub const SITE_SIGNATURES: &[SiteSignature] = &[
    SiteSignature {
        site: Site::FanFictionNet,
        domain: "fanfiction.net",
    },
    SiteSignature {
        site: Site::ArchiveOfOurOwn,
        domain: "archiveofourown.org",
    },
];

impl SiteSignature {
    /// `host` is the domain itself or a subdomain of it (`www.`, `m.`).
    fn matches(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.');
        host.eq_ignore_ascii_case(self.domain)
            || host
                .len()
                .checked_sub(self.domain.len() + 1)
                .and_then(|dot| host.get(dot..))
                .is_some_and(|tail| {
                    tail.starts_with('.') && tail[1..].eq_ignore_ascii_case(self.domain)
                })
    }
}

/// Maps story URLs to site adapters. Built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct AdapterRegistry {
    signatures: &'static [SiteSignature],
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            signatures: SITE_SIGNATURES,
        }
    }

    /// Which supported site `url` belongs to. Never touches the network.
    pub fn identify(&self, url: &str) -> Result<Site, RetrievalError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(RetrievalError::InvalidUrl {
                input: url.to_string(),
                reason: "URL is empty".to_string(),
            });
        }
        let parsed = Url::parse(trimmed).map_err(|e| RetrievalError::InvalidUrl {
            input: url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(RetrievalError::InvalidUrl {
                input: url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        let host = parsed.host_str().ok_or_else(|| RetrievalError::InvalidUrl {
            input: url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        self.signatures
            .iter()
            .find(|sig| sig.matches(host))
            .map(|sig| sig.site)
            .ok_or_else(|| RetrievalError::SiteNotSupported {
                host: host.to_string(),
            })
    }

    /// Adapter for the site `url` belongs to.
    pub fn resolve(&self, url: &str) -> Result<Box<dyn SiteAdapter>, RetrievalError> {
        let site = self.identify(url)?;
        tracing::debug!(url, %site, "resolved adapter");
        Ok(site.adapter())
    }

    /// Adapter plus the parsed story reference, as every retrieval needs both.
    pub fn resolve_reference(
        &self,
        url: &str,
    ) -> Result<(Box<dyn SiteAdapter>, StoryReference), RetrievalError> {
        let adapter = self.resolve(url)?;
        let story = adapter.parse_reference(url.trim())?;
        Ok((adapter, story))
    }
}
