//! Collaborator traits the handlers are built on.
//!
//! FamilyCircles owns no genealogy data. Everything it serves comes from a
//! host through three traits:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                    Host                    │
//! │  ┌──────────────┐ ┌─────────────┐ ┌──────┐ │
//! │  │ RecordSource │ │SearchService│ │Access│ │
//! │  │ trees/xrefs  │ │ indi/family │ │Policy│ │
//! │  └──────────────┘ └─────────────┘ └──────┘ │
//! └──────────────┬─────────────────────────────┘
//!                ▼
//!     RecordHandler / SearchHandler → JSON
//! ```
//!
//! A [`Host`] bundles one implementation of each and is handed to the
//! handlers when they are constructed. [`MemoryHost`](crate::memory::MemoryHost)
//! implements the data traits over a JSON snapshot.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use family_circles::access::RestrictionPolicy;
//! use family_circles::memory::MemoryHost;
//! use family_circles::traits::Host;
//!
//! let data = Arc::new(MemoryHost::from_json(r#"{"trees": []}"#).unwrap());
//! let host = Host::new(data.clone(), data, Arc::new(RestrictionPolicy::default()));
//! ```

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ApiError;
use crate::models::{Family, Individual, Tree};

/// How a thumbnail is fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailFit {
    #[default]
    Contain,
    Crop,
}

impl fmt::Display for ThumbnailFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailFit::Contain => f.write_str("contain"),
            ThumbnailFit::Crop => f.write_str("crop"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// RecordSource
// ═══════════════════════════════════════════════════════════════════════

/// Record lookup by tree and xref.
///
/// `Ok(None)` means "no such record". An error that should reach the client
/// with a specific status (for instance a family pointing at a missing
/// individual) is returned as an [`ApiError`](crate::error::ApiError)
/// wrapped in `anyhow`.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Resolves a tree by its short name.
    async fn tree(&self, name: &str) -> Result<Option<Tree>>;

    async fn individual(&self, tree: &Tree, xref: &str) -> Result<Option<Individual>>;

    /// Resolves a family with its spouses and children.
    async fn family(&self, tree: &Tree, xref: &str) -> Result<Option<Family>>;

    /// Renders the individual's highlighted image as HTML markup.
    ///
    /// Returns `None` when the individual has no image.
    async fn thumbnail(
        &self,
        tree: &Tree,
        individual: &Individual,
        width: u32,
        height: u32,
        fit: ThumbnailFit,
    ) -> Result<Option<String>>;
}

// ═══════════════════════════════════════════════════════════════════════
// SearchService
// ═══════════════════════════════════════════════════════════════════════

/// Free-text matching over the host's records.
///
/// Result order is significant: the search endpoint preserves it.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search_individuals(&self, trees: &[Tree], terms: &[String])
        -> Result<Vec<Individual>>;

    /// Families whose members match.
    async fn search_families(&self, trees: &[Tree], terms: &[String]) -> Result<Vec<Family>>;

    /// Families whose family name (the spouses' surnames) matches.
    async fn search_family_names(&self, trees: &[Tree], terms: &[String])
        -> Result<Vec<Family>>;
}

// ═══════════════════════════════════════════════════════════════════════
// AccessPolicy
// ═══════════════════════════════════════════════════════════════════════

/// Decides whether a record may be shown to the caller.
///
/// Handlers consult it before serializing any record and fail closed.
pub trait AccessPolicy: Send + Sync {
    fn can_show_individual(&self, individual: &Individual) -> bool;

    fn can_show_family(&self, family: &Family) -> bool;
}

/// The collaborators every handler is built from.
#[derive(Clone)]
pub struct Host {
    pub records: Arc<dyn RecordSource>,
    pub search: Arc<dyn SearchService>,
    pub access: Arc<dyn AccessPolicy>,
}

impl Host {
    pub fn new(
        records: Arc<dyn RecordSource>,
        search: Arc<dyn SearchService>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            records,
            search,
            access,
        }
    }

    /// Resolves a tree by name, failing with [`ApiError::UnknownTree`].
    pub async fn tree(&self, name: &str) -> Result<Tree, ApiError> {
        self.records
            .tree(name)
            .await?
            .ok_or_else(|| ApiError::UnknownTree(name.to_string()))
    }
}
