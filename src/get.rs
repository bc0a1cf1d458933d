//! Record retrieval by xref.
//!
//! Backs `GET /fc/{tree}/object/{id}` and the `fc get` CLI command. The first
//! character of the xref selects the record type: `I` for individuals, `F`
//! for families. Anything else is rejected before the host is consulted.

use std::borrow::Cow;
use std::sync::LazyLock;

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use regex::Regex;

use crate::config::{AvatarConfig, Config};
use crate::error::ApiError;
use crate::memory::snapshot_host;
use crate::models::{FamilyProjection, IndividualProjection, RecordProjection, Tree};
use crate::request_url::RequestUrl;
use crate::traits::Host;

static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"src="([^"]+)""#).expect("img src pattern"));

/// Record type selected by the xref prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Individual,
    Family,
}

impl RecordKind {
    pub fn of(xref: &str) -> Result<Self, ApiError> {
        match xref.chars().next() {
            Some('I') => Ok(RecordKind::Individual),
            Some('F') => Ok(RecordKind::Family),
            _ => Err(ApiError::UnsupportedId(xref.to_string())),
        }
    }
}

/// Handler for record lookups.
#[derive(Clone)]
pub struct RecordHandler {
    host: Host,
    avatar: AvatarConfig,
}

impl RecordHandler {
    pub fn new(host: Host, avatar: AvatarConfig) -> Self {
        Self { host, avatar }
    }

    /// Looks up `xref` in the tree named `tree_name` and projects it.
    ///
    /// `url` is the resolved URL of the current request; it is used to build
    /// the person page and avatar links.
    pub async fn handle(
        &self,
        tree_name: &str,
        xref: &str,
        url: &RequestUrl,
    ) -> Result<RecordProjection, ApiError> {
        let kind = RecordKind::of(xref)?;
        let tree = self.host.tree(tree_name).await?;

        let projection = match kind {
            RecordKind::Individual => {
                RecordProjection::Individual(self.individual(&tree, xref, url).await?)
            }
            RecordKind::Family => RecordProjection::Family(self.family(&tree, xref).await?),
        };
        tracing::debug!(tree = %tree.name, xref, "record projected");
        Ok(projection)
    }

    async fn individual(
        &self,
        tree: &Tree,
        xref: &str,
        url: &RequestUrl,
    ) -> Result<IndividualProjection, ApiError> {
        let individual = self
            .host
            .records
            .individual(tree, xref)
            .await?
            .ok_or_else(|| ApiError::NotFound(xref.to_string()))?;
        if !self.host.access.can_show_individual(&individual) {
            return Err(ApiError::AccessDenied(xref.to_string()));
        }

        let page = url.with_route(&format!(
            "/tree/{}/individual/{}",
            tree.name, individual.xref
        ));

        let markup = self
            .host
            .records
            .thumbnail(
                tree,
                &individual,
                self.avatar.width,
                self.avatar.height,
                self.avatar.fit,
            )
            .await?;
        let avatar = markup
            .as_deref()
            .and_then(first_image_src)
            .map(|src| url.resolve_link(&src));

        let families = if individual.spouse_families.is_empty() {
            None
        } else {
            Some(individual.spouse_families.clone())
        };

        Ok(IndividualProjection {
            id: individual.xref.clone(),
            kind: "person".to_string(),
            page,
            name: individual.first_given().to_string(),
            avatar,
            family: individual.child_families.first().cloned(),
            families,
        })
    }

    async fn family(&self, tree: &Tree, xref: &str) -> Result<FamilyProjection, ApiError> {
        let family = self
            .host
            .records
            .family(tree, xref)
            .await?
            .ok_or_else(|| ApiError::NotFound(xref.to_string()))?;
        if !self.host.access.can_show_family(&family) {
            return Err(ApiError::AccessDenied(xref.to_string()));
        }

        let children: Vec<_> = family
            .children
            .iter()
            .filter(|c| self.host.access.can_show_individual(c))
            .collect();

        // First child, then father, then mother.
        let name = children
            .first()
            .copied()
            .into_iter()
            .chain(family.husband.iter())
            .chain(family.wife.iter())
            .map(|i| i.first_surname())
            .find(|s| !s.is_empty())
            .unwrap_or("")
            .to_string();

        let children = if children.is_empty() {
            None
        } else {
            Some(children.iter().map(|c| c.xref.clone()).collect::<Vec<_>>())
        };

        Ok(FamilyProjection {
            id: family.xref.clone(),
            kind: "family".to_string(),
            name,
            children,
            father: family.husband.as_ref().map(|h| h.xref.clone()),
            mother: family.wife.as_ref().map(|w| w.xref.clone()),
        })
    }
}

/// CLI entry point: projects one record and prints it as JSON.
///
/// Links are built as if the record had been requested at
/// `/fc/<tree>/object/<xref>` on `[server].base_url`.
pub async fn run_get(config: &Config, tree: &str, xref: &str) -> anyhow::Result<()> {
    let handler = RecordHandler::new(snapshot_host(config)?, config.avatar.clone());
    let base_url = config.server.base_url();
    let url = RequestUrl::resolve(
        base_url.as_ref(),
        None,
        &format!("/fc/{}/object/{}", tree, xref),
        None,
    );

    let projection = handler.handle(tree, xref, &url).await?;
    println!("{}", serde_json::to_string_pretty(&projection)?);
    Ok(())
}

/// The `src` of the first image in `markup`, after HTML entity decoding.
///
/// Unknown or unterminated entities leave the markup as it was.
pub fn first_image_src(markup: &str) -> Option<String> {
    let decoded = unescape_with(markup, resolve_html5_entity).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "avatar markup not entity-decoded");
        Cow::Borrowed(markup)
    });
    IMG_SRC
        .captures(&decoded)
        .map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RestrictionPolicy;
    use crate::memory::MemoryHost;
    use std::sync::Arc;

    const SNAPSHOT: &str = r#"{
      "trees": [{
        "id": 1, "name": "demo",
        "individuals": [
          {"xref": "I1", "names": [{"type": "NAME", "givn": "Tom", "surname": "Jones"}],
           "fams": ["F1", "F3"], "media": "tom.jpg"},
          {"xref": "I2", "names": [{"type": "NAME", "givn": "Sue", "surname": "Brown"}], "fams": ["F1"]},
          {"xref": "I3", "names": [{"type": "NAME", "givn": "Ann", "surname": "Smith"}], "famc": ["F1"]},
          {"xref": "I4", "names": [{"type": "NAME", "givn": "Kim", "surname": ""}], "fams": ["F2"]},
          {"xref": "I5", "names": [{"type": "NAME", "givn": "Lee", "surname": "Gray"}], "fams": ["F2"]},
          {"xref": "I6", "names": [{"type": "NAME", "givn": "Hidden", "surname": "Secret"}],
           "resn": "confidential", "famc": ["F2"]}
        ],
        "families": [
          {"xref": "F1", "husb": "I1", "wife": "I2", "chil": ["I3"]},
          {"xref": "F2", "husb": "I4", "wife": "I5", "chil": ["I6"]},
          {"xref": "F3", "husb": "I1"},
          {"xref": "F4", "husb": "I6"}
        ]
      }]
    }"#;

    fn handler() -> RecordHandler {
        let data = Arc::new(MemoryHost::from_json(SNAPSHOT).unwrap());
        let host = Host::new(data.clone(), data, Arc::new(RestrictionPolicy::default()));
        RecordHandler::new(host, AvatarConfig::default())
    }

    fn url() -> RequestUrl {
        RequestUrl::resolve(None, Some("gen.example"), "/fc/demo/object/I1", Some("lang=en"))
    }

    async fn individual(xref: &str) -> IndividualProjection {
        match handler().handle("demo", xref, &url()).await.unwrap() {
            RecordProjection::Individual(p) => p,
            other => panic!("expected individual, got {:?}", other),
        }
    }

    async fn family(xref: &str) -> FamilyProjection {
        match handler().handle("demo", xref, &url()).await.unwrap() {
            RecordProjection::Family(p) => p,
            other => panic!("expected family, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unsupported_prefixes_are_rejected_before_lookup() {
        for id in ["S1", "N7", "i1", ""] {
            let err = handler().handle("no-such-tree", id, &url()).await.unwrap_err();
            assert!(matches!(err, ApiError::UnsupportedId(_)), "{id}: {err:?}");
        }
    }

    #[tokio::test]
    async fn individual_projection() {
        let p = individual("I1").await;
        assert_eq!(p.id, "I1");
        assert_eq!(p.kind, "person");
        assert_eq!(p.name, "Tom");
        assert_eq!(
            p.page,
            "http://gen.example/?lang=en&route=%2Ftree%2Fdemo%2Findividual%2FI1"
        );
        assert_eq!(p.family, None);
        assert_eq!(p.families, Some(vec!["F1".to_string(), "F3".to_string()]));
        let avatar = p.avatar.unwrap();
        assert!(avatar.starts_with("http://gen.example/index.php?route=%2Fmedia-thumbnail&tree=demo&xref=I1"));
    }

    #[tokio::test]
    async fn individual_without_media_has_no_avatar() {
        let p = individual("I3").await;
        assert_eq!(p.avatar, None);
        assert_eq!(p.family.as_deref(), Some("F1"));
        assert_eq!(p.families, None);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("avatar").is_none());
    }

    #[tokio::test]
    async fn family_name_prefers_first_child() {
        let f = family("F1").await;
        assert_eq!(f.name, "Smith");
        assert_eq!(f.children, Some(vec!["I3".to_string()]));
        assert_eq!(f.father.as_deref(), Some("I1"));
        assert_eq!(f.mother.as_deref(), Some("I2"));
    }

    #[tokio::test]
    async fn family_name_skips_hidden_child_and_empty_surname() {
        let f = family("F2").await;
        assert_eq!(f.children, None);
        assert_eq!(f.name, "Gray");
    }

    #[tokio::test]
    async fn family_without_wife_omits_mother() {
        let f = family("F3").await;
        assert_eq!(f.name, "Jones");
        assert_eq!(f.mother, None);
        let json = serde_json::to_value(&f).unwrap();
        assert!(json.get("mother").is_none());
        assert!(json.get("children").is_none());
    }

    #[tokio::test]
    async fn missing_and_hidden_records() {
        let h = handler();
        let err = h.handle("demo", "I99", &url()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err = h.handle("demo", "I6", &url()).await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));

        let err = h.handle("demo", "F4", &url()).await.unwrap_err();
        assert!(matches!(err, ApiError::AccessDenied(_)));

        let err = h.handle("elsewhere", "I1", &url()).await.unwrap_err();
        assert!(matches!(err, ApiError::UnknownTree(_)));
    }

    #[test]
    fn image_src_is_entity_decoded() {
        let markup = r#"<div><img src="index.php?a=1&amp;b=&#x32;" alt="x"><img src="other.jpg"></div>"#;
        assert_eq!(first_image_src(markup).as_deref(), Some("index.php?a=1&b=2"));
        assert_eq!(first_image_src("<i class=\"icon\"></i>"), None);
    }

    #[test]
    fn image_src_decodes_html5_named_entities() {
        let markup = r#"<img src="media/Ren&eacute;&nbsp;&hellip;.jpg">"#;
        assert_eq!(
            first_image_src(markup).as_deref(),
            Some("media/Ren\u{e9}\u{a0}\u{2026}.jpg")
        );
    }

    #[test]
    fn image_src_with_unknown_entity_is_left_raw() {
        let markup = r#"<img src="a&bogus;b.jpg">"#;
        assert_eq!(first_image_src(markup).as_deref(), Some("a&bogus;b.jpg"));
    }
}
