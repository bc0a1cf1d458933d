//! Request URL resolution.
//!
//! Handlers need the public address of the front controller to build the
//! `page` and `avatar` links of a person. The host serves everything through
//! one entry point (`.../index.php`) and selects the page with a `route`
//! query parameter; FamilyCircles is usually mounted next to it under
//! `.../fc/...`. [`RequestUrl`] folds both shapes into:
//!
//! - an origin (`scheme://host[:port]`), from `server.base_url` when
//!   configured, else from the `Host` header (with the scheme a TLS proxy
//!   reports in `X-Forwarded-Proto`), else empty (relative links);
//! - a base path, the part of the request path before `index.php` or `/fc/`;
//! - the ordered query parameters, with `route` filled in from the path when
//!   the request did not carry one.

use url::{form_urlencoded, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    origin: String,
    base_path: String,
    query: Vec<(String, String)>,
}

impl RequestUrl {
    pub fn resolve(
        base_url: Option<&Url>,
        host: Option<&str>,
        path: &str,
        raw_query: Option<&str>,
    ) -> Self {
        Self::resolve_forwarded(base_url, host, None, path, raw_query)
    }

    /// Like [`resolve`](Self::resolve), taking the scheme of a `Host`-derived
    /// origin from `forwarded_proto` (`X-Forwarded-Proto`). Only `http` and
    /// `https` are honored.
    pub fn resolve_forwarded(
        base_url: Option<&Url>,
        host: Option<&str>,
        forwarded_proto: Option<&str>,
        path: &str,
        raw_query: Option<&str>,
    ) -> Self {
        let origin = match (base_url, host) {
            (Some(url), _) => origin_of(url),
            (None, Some(host)) if !host.is_empty() => {
                format!("{}://{}", forwarded_scheme(forwarded_proto), host)
            }
            _ => String::new(),
        };

        let mut query: Vec<(String, String)> = raw_query
            .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();

        let (base_path, route_from_path) = split_path(path);
        if let Some(route) = route_from_path {
            if !query.iter().any(|(k, _)| k == "route") {
                query.push(("route".to_string(), route));
            }
        }

        Self {
            origin,
            base_path,
            query,
        }
    }

    /// Origin plus base path: the request URL with its query stripped.
    pub fn base(&self) -> String {
        let path = if self.base_path.is_empty() {
            "/"
        } else {
            self.base_path.as_str()
        };
        format!("{}{}", self.origin, path)
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// The `route` parameter, if any.
    pub fn route(&self) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == "route")
            .map(|(_, v)| v.as_str())
    }

    /// This request's URL with `route` replaced and every other parameter
    /// kept in place.
    pub fn with_route(&self, route: &str) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;
        for (k, v) in &self.query {
            if k == "route" {
                if !replaced {
                    serializer.append_pair(k, route);
                    replaced = true;
                }
            } else {
                serializer.append_pair(k, v);
            }
        }
        if !replaced {
            serializer.append_pair("route", route);
        }
        format!("{}?{}", self.base(), serializer.finish())
    }

    /// Resolves a link found in host markup against this request.
    pub fn resolve_link(&self, src: &str) -> String {
        if src.starts_with("http://") || src.starts_with("https://") || src.starts_with("//") {
            src.to_string()
        } else if src.starts_with('/') {
            format!("{}{}", self.origin, src)
        } else {
            format!(
                "{}{}/{}",
                self.origin,
                self.base_path.trim_end_matches('/'),
                src
            )
        }
    }
}

fn forwarded_scheme(proto: Option<&str>) -> &'static str {
    // Proxy chains append; the first entry is the client-facing one.
    let first = proto
        .and_then(|p| p.split(',').next())
        .map(str::trim)
        .unwrap_or("");
    if first.eq_ignore_ascii_case("https") {
        "https"
    } else {
        "http"
    }
}

fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or("localhost");
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Splits a request path into its base path and the route it encodes.
fn split_path(path: &str) -> (String, Option<String>) {
    if let Some((before, after)) = path.split_once("index.php") {
        let route = (!after.is_empty()).then(|| after.to_string());
        return (before.trim_end_matches('/').to_string(), route);
    }
    if let Some(pos) = path.find("/fc/") {
        return (path[..pos].to_string(), Some(path[pos..].to_string()));
    }
    if path.ends_with("/fc") {
        let pos = path.len() - 3;
        return (path[..pos].to_string(), Some(path[pos..].to_string()));
    }
    (path.trim_end_matches('/').to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_is_taken_from_mounted_path() {
        let url = RequestUrl::resolve(None, Some("gen.example"), "/fc/demo/object/I1", None);
        assert_eq!(url.base(), "http://gen.example/");
        assert_eq!(url.route(), Some("/fc/demo/object/I1"));
    }

    #[test]
    fn front_controller_path_is_folded_into_route() {
        let url = RequestUrl::resolve(
            None,
            Some("gen.example"),
            "/webtrees/index.php/fc/demo/search",
            Some("search=smith"),
        );
        assert_eq!(url.base(), "http://gen.example/webtrees");
        assert_eq!(url.route(), Some("/fc/demo/search"));
        assert_eq!(url.query()[0], ("search".to_string(), "smith".to_string()));
    }

    #[test]
    fn explicit_route_parameter_wins() {
        let url = RequestUrl::resolve(
            None,
            None,
            "/index.php",
            Some("route=%2Ffc%2Fdemo%2Fobject%2FI7"),
        );
        assert_eq!(url.route(), Some("/fc/demo/object/I7"));
        assert_eq!(url.query().len(), 1);
    }

    #[test]
    fn with_route_keeps_parameter_order() {
        let url = RequestUrl::resolve(
            None,
            Some("h"),
            "/index.php",
            Some("lang=en&route=%2Ffc%2Fdemo%2Fobject%2FI1&theme=clouds"),
        );
        assert_eq!(
            url.with_route("/tree/demo/individual/I1"),
            "http://h/?lang=en&route=%2Ftree%2Fdemo%2Findividual%2FI1&theme=clouds"
        );
    }

    #[test]
    fn base_url_overrides_origin() {
        let base = Url::parse("https://family.example:8443/ignored").unwrap();
        let url = RequestUrl::resolve(Some(&base), Some("internal:7340"), "/fc/demo/object/I1", None);
        assert_eq!(url.base(), "https://family.example:8443/");
    }

    #[test]
    fn forwarded_proto_sets_scheme_of_host_origin() {
        let url = RequestUrl::resolve_forwarded(
            None,
            Some("gen.example"),
            Some("HTTPS, http"),
            "/fc/demo/object/I1",
            None,
        );
        assert_eq!(url.base(), "https://gen.example/");

        let url =
            RequestUrl::resolve_forwarded(None, Some("gen.example"), Some("gopher"), "/fc/config", None);
        assert_eq!(url.base(), "http://gen.example/");

        let base = Url::parse("http://family.example").unwrap();
        let url = RequestUrl::resolve_forwarded(
            Some(&base),
            Some("gen.example"),
            Some("https"),
            "/fc/config",
            None,
        );
        assert_eq!(url.base(), "http://family.example/");
    }

    #[test]
    fn links_resolve_against_base() {
        let url = RequestUrl::resolve(None, Some("h"), "/tree/index.php", None);
        assert_eq!(url.resolve_link("index.php?x=1"), "http://h/tree/index.php?x=1");
        assert_eq!(url.resolve_link("/media/a.jpg"), "http://h/media/a.jpg");
        assert_eq!(
            url.resolve_link("https://cdn.example/a.jpg"),
            "https://cdn.example/a.jpg"
        );
    }
}
