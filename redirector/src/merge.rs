//! Query parameter merging for absolute destinations.
//!
//! Precedence, highest first:
//! 1. parameters already on the destination URL, never overwritten
//! 2. inbound UTM parameters, only when incoming override is allowed
//! 3. registry UTM defaults
//!
//! Without override, inbound UTM parameters still fill keys the registry leaves
//! empty. Non-UTM inbound parameters are appended, every occurrence of a repeated
//! key included, unless the destination already carries them. Internal keys are
//! dropped everywhere.

use crate::errors::DestinationError;
use indexmap::IndexMap;
use registry::types::{UTM_KEYS, UtmDefaults, is_utm_key};
use url::Url;
use url::form_urlencoded;

/// Request parameters that only steer the gateway and never leave it.
pub const INTERNAL_KEYS: [&str; 3] = ["pageId", "slug", "isFile"];

pub fn is_internal_key(key: &str) -> bool {
    INTERNAL_KEYS.contains(&key)
}

#[derive(Clone, Debug, PartialEq)]
pub struct Merged {
    pub target_url: String,
    /// Query of `target_url` as an ordered map, first occurrence of a key wins.
    pub params: IndexMap<String, String>,
}

pub fn merge(
    destination: &str,
    registry_utm: &UtmDefaults,
    incoming: &[(String, String)],
    allow_incoming_override: bool,
) -> Result<Merged, DestinationError> {
    let mut url = Url::parse(destination)
        .map_err(|_| DestinationError::InvalidDestination(destination.to_string()))?;

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_internal_key(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let carried = pairs.len();

    for key in UTM_KEYS {
        if contains(&pairs, key) {
            continue;
        }
        let inbound = first_value(incoming, key);
        let configured = registry_utm.get(key);
        let value = if allow_incoming_override {
            inbound.or(configured)
        } else {
            configured.or(inbound)
        };
        if let Some(value) = value {
            pairs.push((key.to_string(), value.to_string()));
        }
    }

    for (key, value) in incoming {
        if is_utm_key(key) || is_internal_key(key) || contains(&pairs[..carried], key) {
            continue;
        }
        pairs.push((key.clone(), value.clone()));
    }

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }

    let mut params = IndexMap::with_capacity(pairs.len());
    for (key, value) in pairs {
        params.entry(key).or_insert(value);
    }

    Ok(Merged {
        target_url: url.into(),
        params,
    })
}

/// Removes internal keys from the query of a relative destination and leaves
/// it untouched otherwise.
pub fn strip_internal_keys(relative: &str) -> String {
    let (without_fragment, fragment) = match relative.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (relative, None),
    };
    let Some((path, query)) = without_fragment.split_once('?') else {
        return relative.to_string();
    };

    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.iter().any(|(k, _)| is_internal_key(k)) {
        return relative.to_string();
    }

    let kept = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().filter(|(k, _)| !is_internal_key(k)))
        .finish();

    let mut out = path.to_string();
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept);
    }
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Appends `key=value` to an absolute URL unless the key is already present.
pub fn append_if_absent(target: &str, key: &str, value: &str) -> String {
    match Url::parse(target) {
        Ok(mut url) => {
            if !url.query_pairs().any(|(k, _)| k == key) {
                url.query_pairs_mut().append_pair(key, value);
            }
            url.into()
        }
        Err(_) => target.to_string(),
    }
}

/// First value of `key` in an ordered list of query pairs.
pub fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn contains(pairs: &[(String, String)], key: &str) -> bool {
    pairs.iter().any(|(k, _)| k == key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn registry_utm() -> UtmDefaults {
        UtmDefaults {
            source: Some("newsletter".into()),
            campaign: Some("plain".into()),
            campaign_relation: Some("spring-sale".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_destination_params_win() {
        let incoming = params(&[("utm_source", "inbound"), ("ref", "inbound")]);
        for allow in [false, true] {
            let merged = merge(
                "https://example.com/x?utm_source=dest&ref=dest",
                &registry_utm(),
                &incoming,
                allow,
            )
            .unwrap();
            assert_eq!(merged.params["utm_source"], "dest");
            assert_eq!(merged.params["ref"], "dest");
        }
    }

    #[test]
    fn test_registry_wins_without_override() {
        let incoming = params(&[("utm_source", "inbound"), ("utm_medium", "social")]);
        let merged = merge("https://example.com", &registry_utm(), &incoming, false).unwrap();
        assert_eq!(
            merged.target_url,
            "https://example.com/?utm_source=newsletter&utm_campaign=spring-sale&utm_medium=social"
        );
    }

    #[test]
    fn test_inbound_wins_with_override() {
        let incoming = params(&[("utm_source", "inbound")]);
        let merged = merge("https://example.com", &registry_utm(), &incoming, true).unwrap();
        assert_eq!(merged.params["utm_source"], "inbound");
        assert_eq!(merged.params["utm_campaign"], "spring-sale");
    }

    #[test]
    fn test_internal_keys_dropped() {
        let incoming = params(&[("pageId", "abc"), ("slug", "s"), ("isFile", "1"), ("ref", "x")]);
        let merged = merge(
            "https://example.com/t?isFile=true&a=1",
            &UtmDefaults::default(),
            &incoming,
            false,
        )
        .unwrap();
        assert_eq!(merged.target_url, "https://example.com/t?a=1&ref=x");
        assert!(merged.params.keys().all(|k| !is_internal_key(k)));
    }

    #[test]
    fn test_no_params_leaves_no_query() {
        let merged = merge(
            "https://example.com/t?pageId=1",
            &UtmDefaults::default(),
            &[],
            false,
        )
        .unwrap();
        assert_eq!(merged.target_url, "https://example.com/t");
        assert!(merged.params.is_empty());
    }

    #[test]
    fn test_repeated_keys_pass_through() {
        let incoming = params(&[
            ("tag", "a"),
            ("utm_source", "first"),
            ("tag", "b"),
            ("utm_source", "second"),
            ("ref", "x"),
            ("ref", "y"),
        ]);
        let merged = merge(
            "https://example.com/t?ref=dest",
            &UtmDefaults::default(),
            &incoming,
            false,
        )
        .unwrap();
        assert_eq!(
            merged.target_url,
            "https://example.com/t?ref=dest&utm_source=first&tag=a&tag=b"
        );
        assert_eq!(merged.params["tag"], "a");
    }

    #[test]
    fn test_encoding_and_fragment() {
        let incoming = params(&[("utm_content", "a b&c")]);
        let merged = merge(
            "https://example.com/t#section",
            &UtmDefaults::default(),
            &incoming,
            false,
        )
        .unwrap();
        assert_eq!(
            merged.target_url,
            "https://example.com/t?utm_content=a+b%26c#section"
        );
    }

    #[test]
    fn test_strip_internal_keys() {
        assert_eq!(strip_internal_keys("/about"), "/about");
        assert_eq!(strip_internal_keys("/about?x=1#top"), "/about?x=1#top");
        assert_eq!(strip_internal_keys("/about?pageId=1&x=1#top"), "/about?x=1#top");
        assert_eq!(strip_internal_keys("/about?slug=s"), "/about");
    }

    #[test]
    fn test_append_if_absent() {
        assert_eq!(
            append_if_absent("https://example.com/t?a=1", "redirect_source", "Direct"),
            "https://example.com/t?a=1&redirect_source=Direct"
        );
        assert_eq!(
            append_if_absent("https://example.com/t?redirect_source=x", "redirect_source", "Direct"),
            "https://example.com/t?redirect_source=x"
        );
    }
}
