//! Free-text search over individuals and families.
//!
//! Backs `GET /fc/{tree}/search?search=<query>` and the `fc search` CLI
//! command. The query is split into terms by
//! [`extract_search_terms`](crate::terms::extract_search_terms); matching
//! itself is the host's job. This module only merges and labels the results:
//!
//! - individuals come first, in host order, labelled `"<given> <surname>"`
//!   with married surnames appended after `/`;
//! - families follow, member matches then family-name matches with
//!   duplicates removed, labelled `"<surname> <given>/<given>"`.

use std::collections::HashSet;

use crate::config::Config;
use crate::error::ApiError;
use crate::memory::snapshot_host;
use crate::models::{Family, Individual, NameKind, SearchResultItem};
use crate::terms::extract_search_terms;
use crate::traits::Host;

/// Handler for searches.
#[derive(Clone)]
pub struct SearchHandler {
    host: Host,
}

impl SearchHandler {
    pub fn new(host: Host) -> Self {
        Self { host }
    }

    /// Searches the tree named `tree_name` for `query`.
    ///
    /// A query without terms is rejected before the tree is resolved.
    pub async fn handle(
        &self,
        tree_name: &str,
        query: &str,
    ) -> Result<Vec<SearchResultItem>, ApiError> {
        let terms = extract_search_terms(query);
        if terms.is_empty() {
            return Err(ApiError::MissingSearchTerm);
        }

        let tree = self.host.tree(tree_name).await?;
        let trees = [tree];

        let individuals = self.host.search.search_individuals(&trees, &terms).await?;
        let by_member = self.host.search.search_families(&trees, &terms).await?;
        let by_name = self.host.search.search_family_names(&trees, &terms).await?;
        let families = merge_families(by_member, by_name);

        let access = &self.host.access;
        let mut results = Vec::with_capacity(individuals.len() + families.len());
        results.extend(
            individuals
                .iter()
                .filter(|i| access.can_show_individual(i))
                .map(|i| SearchResultItem {
                    id: i.xref.clone(),
                    text: individual_text(i),
                }),
        );
        results.extend(
            families
                .iter()
                .filter(|f| access.can_show_family(f))
                .map(|f| SearchResultItem {
                    id: f.xref.clone(),
                    text: family_text(f),
                }),
        );

        tracing::debug!(
            tree = %trees[0].name,
            terms = ?terms,
            results = results.len(),
            "search complete"
        );
        Ok(results)
    }
}

/// CLI entry point: runs a search and prints the results as JSON.
pub async fn run_search(config: &Config, tree: &str, query: &str) -> anyhow::Result<()> {
    let handler = SearchHandler::new(snapshot_host(config)?);
    let results = handler.handle(tree, query).await?;
    if results.is_empty() {
        eprintln!("No results.");
    }
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Concatenates two family lists, keeping the first occurrence of each
/// `(xref, tree_id)` pair.
pub fn merge_families(first: Vec<Family>, second: Vec<Family>) -> Vec<Family> {
    let mut seen = HashSet::new();
    first
        .into_iter()
        .chain(second)
        .filter(|f| seen.insert((f.xref.clone(), f.tree_id)))
        .collect()
}

/// `"<given> <surname>"`, married surnames appended after `/`.
pub fn individual_text(individual: &Individual) -> String {
    let mut first = String::new();
    let mut last = String::new();
    for name in &individual.names {
        match name.kind {
            NameKind::Primary => {
                if !name.givn.is_empty() {
                    first = name.givn.clone();
                }
                if !name.surname.is_empty() {
                    last = name.surname.clone();
                }
            }
            NameKind::Married => {
                if !last.is_empty() {
                    last.push('/');
                }
                last.push_str(&name.surname);
            }
            NameKind::Other(_) => {}
        }
    }
    format!("{} {}", first, last)
}

/// `"<surname> <given>/<given>"` over husband then wife.
pub fn family_text(family: &Family) -> String {
    let mut first = String::new();
    let mut last = String::new();
    for spouse in family.spouses() {
        for name in spouse
            .names
            .iter()
            .filter(|n| n.kind == NameKind::Primary)
        {
            if !name.givn.is_empty() {
                if !first.is_empty() {
                    first.push('/');
                }
                first.push_str(&name.givn);
            }
            if !name.surname.is_empty() && last.is_empty() {
                last = name.surname.clone();
            }
        }
    }
    format!("{} {}", last, first)
}
