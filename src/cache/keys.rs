//! Cache key derivation.
//!
//! A key is `operation:` followed by every parameter as `name:value`, sorted by name and joined
//! with [`PARAM_DELIMITER`]. Reserved characters inside names and values are backslash-escaped so
//! distinct parameter sets can never render to the same key. An absent optional value renders as
//! the bare name with no separator, which no present value can produce.

use std::collections::BTreeMap;
use std::fmt::{Display, Write as _};

pub const PARAM_DELIMITER: char = '|';
const PAIR_SEPARATOR: char = ':';
const ESCAPE: char = '\\';

fn push_escaped(out: &mut String, raw: &str) {
    for c in raw.chars() {
        if matches!(c, PARAM_DELIMITER | PAIR_SEPARATOR | ESCAPE) {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

fn render<'a, I>(operation: &str, params: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut key = String::with_capacity(operation.len() + 64);
    push_escaped(&mut key, operation);
    key.push(PAIR_SEPARATOR);

    for (position, (name, value)) in params.into_iter().enumerate() {
        if position > 0 {
            key.push(PARAM_DELIMITER);
        }
        push_escaped(&mut key, name);
        if let Some(value) = value {
            key.push(PAIR_SEPARATOR);
            push_escaped(&mut key, value);
        }
    }
    key
}

/// Render a key from an operation name and its full parameter set.
pub fn build_key(operation: &str, params: &BTreeMap<String, String>) -> String {
    render(
        operation,
        params
            .iter()
            .map(|(name, value)| (name.as_str(), Some(value.as_str()))),
    )
}

/// Collects parameters for [`build_key`]; insertion order does not matter.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    operation: &'static str,
    params: BTreeMap<String, Option<String>>,
}

impl CacheKeyBuilder {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: &str, value: impl Display) -> Self {
        let mut rendered = String::new();
        let _ = write!(rendered, "{value}");
        self.params.insert(name.to_string(), Some(rendered));
        self
    }

    /// `None` still participates in the key, as the bare parameter name.
    pub fn opt_param(mut self, name: &str, value: Option<impl Display>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => {
                self.params.insert(name.to_string(), None);
                self
            }
        }
    }

    pub fn list_param<I, V>(self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = values
            .into_iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.param(name, joined)
    }

    pub fn build(&self) -> String {
        render(
            self.operation,
            self.params
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_deref())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parameters_are_sorted_by_name() {
        let key = build_key("page", &params(&[("limit", "20"), ("entity", "post:1")]));
        assert_eq!(key, r"page:entity:post\:1|limit:20");
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = CacheKeyBuilder::new("comments.page")
            .param("page", 2)
            .param("limit", 20)
            .param("viewer", "u1")
            .build();
        let backward = CacheKeyBuilder::new("comments.page")
            .param("viewer", "u1")
            .param("limit", 20)
            .param("page", 2)
            .build();
        assert_eq!(forward, backward);
    }

    #[test]
    fn every_relevant_field_changes_the_key() {
        let base = || {
            CacheKeyBuilder::new("comments.search")
                .param("page", 1)
                .param("limit", 20)
                .param("viewer", "u1")
                .param("query", "cat")
                .param("authors", "a1")
        };
        let reference = base().build();

        assert_ne!(reference, base().param("page", 2).build());
        assert_ne!(reference, base().param("limit", 21).build());
        assert_ne!(reference, base().param("viewer", "u2").build());
        assert_ne!(reference, base().param("query", "dog").build());
        assert_ne!(reference, base().param("authors", "a2").build());
        assert_ne!(
            reference,
            CacheKeyBuilder::new("comments.page")
                .param("page", 1)
                .param("limit", 20)
                .param("viewer", "u1")
                .param("query", "cat")
                .param("authors", "a1")
                .build()
        );
    }

    #[test]
    fn reserved_characters_cannot_forge_parameters() {
        let forged = CacheKeyBuilder::new("comments.search")
            .param("query", "cat|viewer:u2")
            .build();
        let genuine = CacheKeyBuilder::new("comments.search")
            .param("query", "cat")
            .param("viewer", "u2")
            .build();
        assert_ne!(forged, genuine);
    }

    #[test]
    fn absent_optional_values_are_distinct_from_empty_strings() {
        let none = CacheKeyBuilder::new("op")
            .opt_param("viewer", None::<&str>)
            .build();
        let empty = CacheKeyBuilder::new("op").param("viewer", "").build();
        assert_ne!(none, empty);
    }

    #[test]
    fn absent_optional_values_cannot_be_forged_by_placeholder_text() {
        for lookalike in ["-", "", "none"] {
            let absent = CacheKeyBuilder::new("op")
                .opt_param("viewer", None::<&str>)
                .param("visibility", "public")
                .build();
            let present = CacheKeyBuilder::new("op")
                .opt_param("viewer", Some(lookalike))
                .param("visibility", "public")
                .build();
            assert_ne!(absent, present, "viewer {lookalike:?}");
        }
        assert_eq!(
            CacheKeyBuilder::new("op")
                .opt_param("viewer", None::<&str>)
                .build(),
            "op:viewer"
        );
    }
}
