//! Query parameters for entity lookups

use std::fmt;

/// NGSI-LD query parameters
///
/// Results are always requested in simplified form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pub entity_type: Option<String>,
    pub attrs: Vec<String>,
    /// `attribute == "value"` terms, all of which must hold
    pub equals: Vec<(String, String)>,
    /// Only entities registered locally on the broker
    pub local: bool,
    /// Page size; the broker applies its own default when unset
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParams {
    pub fn new() -> Self {
        Self {
            entity_type: None,
            attrs: Vec::new(),
            equals: Vec::new(),
            local: false,
            limit: None,
            offset: 0,
        }
    }

    pub fn of_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    pub fn attr(mut self, attr: impl Into<String>) -> Self {
        self.attrs.push(attr.into());
        self
    }

    pub fn where_eq(mut self, attr: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.push((attr.into(), value.into()));
        self
    }

    pub fn local(mut self) -> Self {
        self.local = true;
        self
    }

    /// Request one page of `limit` entities starting at `offset`
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// `q` expression, e.g. `service=="urn:ngsi-ld:Service:05"`
    pub fn q_expression(&self) -> Option<String> {
        if self.equals.is_empty() {
            return None;
        }
        let terms: Vec<String> = self
            .equals
            .iter()
            .map(|(attr, value)| format!("{}==\"{}\"", attr, value))
            .collect();
        Some(terms.join(";"))
    }

    /// Query-string pairs, encoded by the HTTP client
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(entity_type) = &self.entity_type {
            pairs.push(("type", entity_type.clone()));
        }
        if !self.attrs.is_empty() {
            pairs.push(("attrs", self.attrs.join(",")));
        }
        if let Some(q) = self.q_expression() {
            pairs.push(("q", q));
        }
        if self.local {
            pairs.push(("local", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
            pairs.push(("offset", self.offset.to_string()));
        }
        pairs.push(("format", "simplified".to_string()));
        pairs
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .to_pairs()
            .into_iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        f.write_str(&rendered.join("&"))
    }
}
