//! Core data models used throughout FamilyCircles.
//!
//! The host types ([`Tree`], [`Individual`], [`Family`]) are what the
//! collaborator traits hand back; the projection types are the JSON shapes
//! the endpoints return. Projections are built per request and discarded
//! after serialization.

use serde::{Deserialize, Serialize};

/// A family tree known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub id: u32,
    pub name: String,
}

/// GEDCOM `RESN` restriction attached to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Restriction {
    #[default]
    None,
    Locked,
    Privacy,
    Confidential,
}

/// The tag a name record was recorded under.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum NameKind {
    /// `NAME`: a primary name.
    Primary,
    /// `_MARNM`: a married name.
    Married,
    /// Any other tag (`_AKA`, `_HEB`, ...). Ignored by the projections.
    Other(String),
}

impl From<String> for NameKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "NAME" => NameKind::Primary,
            "_MARNM" => NameKind::Married,
            _ => NameKind::Other(tag),
        }
    }
}

impl From<NameKind> for String {
    fn from(kind: NameKind) -> Self {
        match kind {
            NameKind::Primary => "NAME".to_string(),
            NameKind::Married => "_MARNM".to_string(),
            NameKind::Other(tag) => tag,
        }
    }
}

/// One name of an individual, as split by the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NameRecord {
    #[serde(rename = "type")]
    pub kind: NameKind,
    #[serde(default)]
    pub givn: String,
    #[serde(default)]
    pub surname: String,
}

impl NameRecord {
    pub fn primary(givn: &str, surname: &str) -> Self {
        Self {
            kind: NameKind::Primary,
            givn: givn.to_string(),
            surname: surname.to_string(),
        }
    }

    pub fn married(surname: &str) -> Self {
        Self {
            kind: NameKind::Married,
            givn: String::new(),
            surname: surname.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    pub xref: String,
    pub tree_id: u32,
    pub names: Vec<NameRecord>,
    /// `FAMC` links, in record order.
    pub child_families: Vec<String>,
    /// `FAMS` links, in record order.
    pub spouse_families: Vec<String>,
    pub restriction: Restriction,
}

impl Individual {
    /// Surname of the first name record, or `""`.
    pub fn first_surname(&self) -> &str {
        self.names
            .first()
            .map(|n| n.surname.as_str())
            .unwrap_or("")
    }

    /// Given name of the first name record, or `""`.
    pub fn first_given(&self) -> &str {
        self.names.first().map(|n| n.givn.as_str()).unwrap_or("")
    }
}

/// A family with its members already resolved by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    pub xref: String,
    pub tree_id: u32,
    pub husband: Option<Individual>,
    pub wife: Option<Individual>,
    pub children: Vec<Individual>,
    pub restriction: Restriction,
}

impl Family {
    /// Spouses in husband-then-wife order, skipping absent ones.
    pub fn spouses(&self) -> impl Iterator<Item = &Individual> {
        self.husband.iter().chain(self.wife.iter())
    }
}

// ============ Response shapes ============

/// `GET /fc/config` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiDescriptor {
    pub api: ApiCapabilities,
}

impl ApiDescriptor {
    /// The descriptor served by this build: a read API with no extra scopes.
    pub fn current() -> Self {
        Self {
            api: ApiCapabilities { read: Vec::new() },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiCapabilities {
    pub read: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndividualProjection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub page: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub families: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FamilyProjection {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub father: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mother: Option<String>,
}

/// Body of a successful record lookup.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RecordProjection {
    Individual(IndividualProjection),
    Family(FamilyProjection),
}

/// One entry of a search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResultItem {
    pub id: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_kind_round_trips_through_tags() {
        let rec: NameRecord =
            serde_json::from_str(r#"{"type":"_MARNM","surname":"Brown"}"#).unwrap();
        assert_eq!(rec.kind, NameKind::Married);
        assert_eq!(rec.givn, "");

        let other: NameRecord = serde_json::from_str(r#"{"type":"_AKA","givn":"Bob"}"#).unwrap();
        assert_eq!(other.kind, NameKind::Other("_AKA".to_string()));
    }

    #[test]
    fn optional_projection_fields_are_omitted() {
        let p = IndividualProjection {
            id: "I1".into(),
            kind: "person".into(),
            page: "http://h/?route=x".into(),
            name: "Ann".into(),
            avatar: None,
            family: None,
            families: None,
        };
        let v = serde_json::to_value(&p).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("avatar"));
        assert!(!obj.contains_key("family"));
        assert!(!obj.contains_key("families"));
        assert_eq!(obj["type"], "person");
    }
}
