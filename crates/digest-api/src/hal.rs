//! Hypermedia envelopes.
//!
//! Responses wrap the payload with navigational links:
//! `{ "_embedded": <payload>, "_links": { "self": {...}, "block": {...},
//! "operations": [{...}], ... } }`. Repeated link names (`operations`)
//! accumulate into arrays.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

pub const HAL_CONTENT_TYPE: &str = "application/hal+json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalLink {
    pub href: String,
}

impl HalLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self { href: href.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LinkEntry {
    One(HalLink),
    Many(Vec<HalLink>),
}

impl Serialize for LinkEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LinkEntry::One(link) => link.serialize(serializer),
            LinkEntry::Many(links) => links.serialize(serializer),
        }
    }
}

/// Payload plus links.
#[derive(Debug, Clone, PartialEq)]
pub struct Hal {
    embedded: Value,
    links: BTreeMap<String, LinkEntry>,
}

impl Hal {
    pub fn new(embedded: Value, self_href: impl Into<String>) -> Self {
        let mut links = BTreeMap::new();
        links.insert("self".to_string(), LinkEntry::One(HalLink::new(self_href)));
        Self { embedded, links }
    }

    /// Adds a link; a repeated name turns the entry into an array.
    pub fn add_link(mut self, name: &str, href: impl Into<String>) -> Self {
        let link = HalLink::new(href);
        match self.links.remove(name) {
            None => {
                self.links.insert(name.to_string(), LinkEntry::One(link));
            }
            Some(LinkEntry::One(existing)) => {
                self.links
                    .insert(name.to_string(), LinkEntry::Many(vec![existing, link]));
            }
            Some(LinkEntry::Many(mut links)) => {
                links.push(link);
                self.links.insert(name.to_string(), LinkEntry::Many(links));
            }
        }
        self
    }

    /// Adds a link that always serializes as an array.
    pub fn add_link_list(mut self, name: &str, hrefs: impl IntoIterator<Item = String>) -> Self {
        let links: Vec<HalLink> = hrefs.into_iter().map(HalLink::new).collect();
        match self.links.remove(name) {
            None => {
                self.links.insert(name.to_string(), LinkEntry::Many(links));
            }
            Some(LinkEntry::One(existing)) => {
                let mut all = vec![existing];
                all.extend(links);
                self.links.insert(name.to_string(), LinkEntry::Many(all));
            }
            Some(LinkEntry::Many(mut existing)) => {
                existing.extend(links);
                self.links.insert(name.to_string(), LinkEntry::Many(existing));
            }
        }
        self
    }

    pub fn embedded(&self) -> &Value {
        &self.embedded
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Hal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("_embedded", &self.embedded)?;
        map.serialize_entry("_links", &self.links)?;
        map.end()
    }
}

/// Appends a query pair to an href.
pub fn add_query(href: &str, key: &str, value: &str) -> String {
    let separator = if href.contains('?') { '&' } else { '?' };
    format!("{href}{separator}{key}={value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let hal = Hal::new(json!({"name": "x"}), "/storage/C1alpha")
            .add_link("block", "/block/100");
        let value = hal.to_value();
        assert_eq!(value["_embedded"]["name"], "x");
        assert_eq!(value["_links"]["self"]["href"], "/storage/C1alpha");
        assert_eq!(value["_links"]["block"]["href"], "/block/100");
    }

    #[test]
    fn test_repeated_links_become_arrays() {
        let hal = Hal::new(json!({}), "/x")
            .add_link("operations", "/operation/aa")
            .add_link("operations", "/operation/bb");
        let value = hal.to_value();
        assert_eq!(value["_links"]["operations"][0]["href"], "/operation/aa");
        assert_eq!(value["_links"]["operations"][1]["href"], "/operation/bb");
    }

    #[test]
    fn test_link_list_serializes_as_array_even_when_single() {
        let hal = Hal::new(json!({}), "/x")
            .add_link_list("operations", vec!["/operation/aa".to_string()]);
        let value = hal.to_value();
        assert!(value["_links"]["operations"].is_array());
    }

    #[test]
    fn test_add_query() {
        assert_eq!(add_query("/a", "offset", "5"), "/a?offset=5");
        assert_eq!(add_query("/a?x=1", "reverse", "true"), "/a?x=1&reverse=true");
    }
}
