//! In-memory host backed by a JSON snapshot.
//!
//! Implements [`RecordSource`] and [`SearchService`] over trees loaded once
//! at startup. The snapshot is immutable afterwards, so lookups need no
//! locking. Used by the `fc` binary and by the tests.
//!
//! # Snapshot format
//!
//! ```json
//! {
//!   "trees": [{
//!     "id": 1, "name": "demo",
//!     "individuals": [{
//!       "xref": "I1",
//!       "names": [{"type": "NAME", "givn": "John", "surname": "Smith"}],
//!       "famc": ["F1"], "fams": ["F2"],
//!       "media": "photos/john.jpg", "resn": "none"
//!     }],
//!     "families": [{"xref": "F1", "husb": "I2", "wife": "I3", "chil": ["I1"]}]
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use quick_xml::escape::escape;
use serde::Deserialize;
use url::form_urlencoded;

use crate::access::RestrictionPolicy;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{Family, Individual, NameRecord, Restriction, Tree};
use crate::traits::{Host, RecordSource, SearchService, ThumbnailFit};

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    trees: Vec<TreeSnapshot>,
}

#[derive(Debug, Deserialize)]
struct TreeSnapshot {
    id: u32,
    name: String,
    #[serde(default)]
    individuals: Vec<RawIndividual>,
    #[serde(default)]
    families: Vec<RawFamily>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawIndividual {
    xref: String,
    #[serde(default)]
    names: Vec<NameRecord>,
    #[serde(default)]
    famc: Vec<String>,
    #[serde(default)]
    fams: Vec<String>,
    #[serde(default)]
    media: Option<String>,
    #[serde(default)]
    resn: Restriction,
}

#[derive(Debug, Clone, Deserialize)]
struct RawFamily {
    xref: String,
    #[serde(default)]
    husb: Option<String>,
    #[serde(default)]
    wife: Option<String>,
    #[serde(default)]
    chil: Vec<String>,
    #[serde(default)]
    resn: Restriction,
}

struct StoredTree {
    tree: Tree,
    individuals: Vec<RawIndividual>,
    individual_index: HashMap<String, usize>,
    families: Vec<RawFamily>,
    family_index: HashMap<String, usize>,
}

impl StoredTree {
    fn raw_individual(&self, xref: &str) -> Option<&RawIndividual> {
        self.individual_index
            .get(xref)
            .map(|&i| &self.individuals[i])
    }

    fn raw_family(&self, xref: &str) -> Option<&RawFamily> {
        self.family_index.get(xref).map(|&i| &self.families[i])
    }

    fn resolve_individual(&self, raw: &RawIndividual) -> Individual {
        Individual {
            xref: raw.xref.clone(),
            tree_id: self.tree.id,
            names: raw.names.clone(),
            child_families: raw.famc.clone(),
            spouse_families: raw.fams.clone(),
            restriction: raw.resn,
        }
    }

    fn member(&self, family: &str, xref: &str, role: &str) -> Result<Individual> {
        match self.raw_individual(xref) {
            Some(raw) => Ok(self.resolve_individual(raw)),
            None => Err(ApiError::MalformedRecord {
                xref: family.to_string(),
                reason: format!("{} @{}@ does not exist", role, xref),
            }
            .into()),
        }
    }

    fn resolve_family(&self, raw: &RawFamily) -> Result<Family> {
        let husband = match &raw.husb {
            Some(x) => Some(self.member(&raw.xref, x, "HUSB")?),
            None => None,
        };
        let wife = match &raw.wife {
            Some(x) => Some(self.member(&raw.xref, x, "WIFE")?),
            None => None,
        };
        let children = raw
            .chil
            .iter()
            .map(|x| self.member(&raw.xref, x, "CHIL"))
            .collect::<Result<Vec<_>>>()?;

        Ok(Family {
            xref: raw.xref.clone(),
            tree_id: self.tree.id,
            husband,
            wife,
            children,
            restriction: raw.resn,
        })
    }

    /// Every given name and surname of the individual, lowercased.
    fn name_text(&self, xref: &str) -> String {
        self.raw_individual(xref)
            .map(|raw| {
                raw.names
                    .iter()
                    .map(|n| format!("{} {}", n.givn, n.surname))
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .unwrap_or_default()
    }

    fn surname_text(&self, xref: &str) -> String {
        self.raw_individual(xref)
            .map(|raw| {
                raw.names
                    .iter()
                    .map(|n| n.surname.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase()
            })
            .unwrap_or_default()
    }

    /// Resolves matching families, skipping ones with dangling links.
    fn matching_families<F>(&self, mut haystack: F, terms: &[String]) -> Vec<Family>
    where
        F: FnMut(&RawFamily) -> String,
    {
        self.families
            .iter()
            .filter(|raw| matches_any(&haystack(raw), terms))
            .filter_map(|raw| match self.resolve_family(raw) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::warn!(tree = %self.tree.name, xref = %raw.xref, error = %e, "skipping family");
                    None
                }
            })
            .collect()
    }
}

fn matches_any(haystack: &str, terms: &[String]) -> bool {
    terms
        .iter()
        .any(|t| !t.is_empty() && haystack.contains(&t.to_lowercase()))
}

/// In-memory host over a JSON snapshot.
pub struct MemoryHost {
    trees: Vec<StoredTree>,
}

impl MemoryHost {
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).with_context(|| "Failed to parse tree snapshot")?;

        let mut trees = Vec::with_capacity(snapshot.trees.len());
        for t in snapshot.trees {
            if trees.iter().any(|s: &StoredTree| s.tree.name == t.name) {
                bail!("duplicate tree name in snapshot: {}", t.name);
            }

            let mut individual_index = HashMap::new();
            for (i, raw) in t.individuals.iter().enumerate() {
                if individual_index.insert(raw.xref.clone(), i).is_some() {
                    bail!("duplicate individual {} in tree {}", raw.xref, t.name);
                }
            }
            let mut family_index = HashMap::new();
            for (i, raw) in t.families.iter().enumerate() {
                if family_index.insert(raw.xref.clone(), i).is_some() {
                    bail!("duplicate family {} in tree {}", raw.xref, t.name);
                }
            }

            trees.push(StoredTree {
                tree: Tree {
                    id: t.id,
                    name: t.name,
                },
                individuals: t.individuals,
                individual_index,
                families: t.families,
                family_index,
            });
        }

        Ok(Self { trees })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tree snapshot: {}", path.display()))?;
        let host = Self::from_json(&content)?;
        tracing::info!(
            path = %path.display(),
            trees = host.trees.len(),
            "loaded tree snapshot"
        );
        Ok(host)
    }

    fn stored(&self, tree: &Tree) -> Option<&StoredTree> {
        self.trees.iter().find(|s| s.tree.id == tree.id)
    }

    fn stored_in<'a>(&'a self, trees: &'a [Tree]) -> impl Iterator<Item = &'a StoredTree> + 'a {
        trees.iter().filter_map(move |t| self.stored(t))
    }
}

/// Builds a [`Host`] over the configured snapshot and access settings.
pub fn snapshot_host(config: &Config) -> Result<Host> {
    let data = Arc::new(MemoryHost::load(&config.data.snapshot)?);
    let access = Arc::new(RestrictionPolicy::new(config.access.show_private));
    Ok(Host::new(data.clone(), data, access))
}

#[async_trait]
impl RecordSource for MemoryHost {
    async fn tree(&self, name: &str) -> Result<Option<Tree>> {
        Ok(self
            .trees
            .iter()
            .find(|s| s.tree.name == name)
            .map(|s| s.tree.clone()))
    }

    async fn individual(&self, tree: &Tree, xref: &str) -> Result<Option<Individual>> {
        Ok(self
            .stored(tree)
            .and_then(|s| s.raw_individual(xref).map(|raw| s.resolve_individual(raw))))
    }

    async fn family(&self, tree: &Tree, xref: &str) -> Result<Option<Family>> {
        let stored = match self.stored(tree) {
            Some(s) => s,
            None => return Ok(None),
        };
        match stored.raw_family(xref) {
            Some(raw) => stored.resolve_family(raw).map(Some),
            None => Ok(None),
        }
    }

    async fn thumbnail(
        &self,
        tree: &Tree,
        individual: &Individual,
        width: u32,
        height: u32,
        fit: ThumbnailFit,
    ) -> Result<Option<String>> {
        let media = self
            .stored(tree)
            .and_then(|s| s.raw_individual(&individual.xref))
            .and_then(|raw| raw.media.as_deref());
        let media = match media {
            Some(m) if !m.is_empty() => m,
            _ => return Ok(None),
        };

        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("route", "/media-thumbnail")
            .append_pair("tree", &tree.name)
            .append_pair("xref", &individual.xref)
            .append_pair("w", &width.to_string())
            .append_pair("h", &height.to_string())
            .append_pair("fit", &fit.to_string())
            .append_pair("file", media)
            .finish();
        let alt = format!("{} {}", individual.first_given(), individual.first_surname());

        Ok(Some(format!(
            r#"<img dir="auto" src="index.php?{}" alt="{}" width="{}" height="{}">"#,
            escape(&query),
            escape(alt.trim()),
            width,
            height
        )))
    }
}

#[async_trait]
impl SearchService for MemoryHost {
    async fn search_individuals(
        &self,
        trees: &[Tree],
        terms: &[String],
    ) -> Result<Vec<Individual>> {
        let mut found = Vec::new();
        for stored in self.stored_in(trees) {
            for raw in &stored.individuals {
                if matches_any(&stored.name_text(&raw.xref), terms) {
                    found.push(stored.resolve_individual(raw));
                }
            }
        }
        Ok(found)
    }

    async fn search_families(&self, trees: &[Tree], terms: &[String]) -> Result<Vec<Family>> {
        let mut found = Vec::new();
        for stored in self.stored_in(trees) {
            found.extend(stored.matching_families(
                |raw| {
                    raw.husb
                        .iter()
                        .chain(raw.wife.iter())
                        .chain(raw.chil.iter())
                        .map(|x| stored.name_text(x))
                        .collect::<Vec<_>>()
                        .join(" ")
                },
                terms,
            ));
        }
        Ok(found)
    }

    async fn search_family_names(
        &self,
        trees: &[Tree],
        terms: &[String],
    ) -> Result<Vec<Family>> {
        let mut found = Vec::new();
        for stored in self.stored_in(trees) {
            found.extend(stored.matching_families(
                |raw| {
                    raw.husb
                        .iter()
                        .chain(raw.wife.iter())
                        .map(|x| stored.surname_text(x))
                        .collect::<Vec<_>>()
                        .join(" ")
                },
                terms,
            ));
        }
        Ok(found)
    }
}
