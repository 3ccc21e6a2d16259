use std::collections::BTreeMap;
use serde_json::{Map, Value};
use crate::error::{Error, Result};

/// A named concept of an ontology. `fields` keeps every other attribute of the node.
#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,
    pub fields: Map<String, Value>,
}

/// One tagged term set: either `{"nodes": {id: {"name": ..}}}` or a plain list of terms.
#[derive(Clone, Debug, PartialEq)]
pub enum TermSetEntry {
    Nodes(BTreeMap<String, Node>),
    Flat(Vec<String>),
}

fn malformed(tag: &str, reason: impl Into<String>) -> Error {
    Error::MalformedTermSet { tag: tag.to_string(), reason: reason.into() }
}

impl TermSetEntry {

    pub fn parse(tag: &str, value: &Value) -> Result<TermSetEntry> {

        match value {
            Value::Array(items) => {
                let terms = items
                    .iter()
                    .map(|item| item.as_str().map(String::from).ok_or_else(|| malformed(tag, "flat term sets may only hold strings")))
                    .collect::<Result<Vec<String>>>()?;
                Ok(TermSetEntry::Flat(terms))
            },
            Value::Object(object) => {
                let nodes = match object.get("nodes") {
                    Some(Value::Object(nodes)) => nodes,
                    Some(_) => return Err(malformed(tag, "\"nodes\" is not an object")),
                    None => return Err(malformed(tag, "missing \"nodes\"")),
                };

                let mut parsed: BTreeMap<String, Node> = BTreeMap::new();
                for (id, node) in nodes {
                    let mut fields = node.as_object().cloned().ok_or_else(|| malformed(tag, format!("node '{}' is not an object", id)))?;
                    let name = match fields.remove("name") {
                        Some(Value::String(name)) => name,
                        _ => return Err(malformed(tag, format!("node '{}' has no string \"name\"", id))),
                    };
                    parsed.insert(id.to_owned(), Node { name, fields });
                }
                Ok(TermSetEntry::Nodes(parsed))
            },
            _ => Err(malformed(tag, "expected an object with \"nodes\" or a list of terms")),
        }
    }

    /// Display names in node id order (or list order for flat sets).
    pub fn names(&self) -> Vec<String> {
        match self {
            TermSetEntry::Nodes(nodes) => nodes.values().map(|n| n.name.to_owned()).collect(),
            TermSetEntry::Flat(terms) => terms.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TermSetEntry::Nodes(nodes) => nodes.len(),
            TermSetEntry::Flat(terms) => terms.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Term sets keyed by corpus or ontology tag.
///
/// Entries are kept as raw JSON and parsed on access, so one malformed tag
/// does not hide the others.
#[derive(Clone, Debug, Default)]
pub struct TermSets {
    entries: BTreeMap<String, Value>,
}

impl TermSets {

    pub fn from_value(value: Value) -> Result<TermSets> {
        match value {
            Value::Object(object) => Ok(Self { entries: object.into_iter().collect() }),
            _ => Err(Error::InvalidTermFile("top level must map tags to term sets".to_string())),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, tag: &str) -> Option<Result<TermSetEntry>> {
        self.entries.get(tag).map(|value| TermSetEntry::parse(tag, value))
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, Result<TermSetEntry>)> + '_ {
        self.entries.iter().map(|(tag, value)| (tag.as_str(), TermSetEntry::parse(tag, value)))
    }

    /// All tags combined into a single node set. Node ids become `<tag>:<id>`,
    /// flat terms become nodes `<tag>:<position>`.
    pub fn merged(&self) -> Result<TermSetEntry> {

        let mut merged: BTreeMap<String, Node> = BTreeMap::new();
        for (tag, entry) in self.entries() {
            match entry? {
                TermSetEntry::Nodes(nodes) => {
                    for (id, node) in nodes {
                        merged.insert(format!("{}:{}", tag, id), node);
                    }
                },
                TermSetEntry::Flat(terms) => {
                    for (i, name) in terms.into_iter().enumerate() {
                        merged.insert(format!("{}:{}", tag, i), Node { name, fields: Map::new() });
                    }
                }
            }
        }

        Ok(TermSetEntry::Nodes(merged))
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use serde_json::json;

    #[test]
    fn parses_both_shapes() {
        let sets = TermSets::from_value(json!({
            "cognitiveatlas": {"nodes": {"n1": {"name": "somatosensation", "type": "concept"}}},
            "neurosynth": ["memory", "pain"]
        })).unwrap();

        match sets.get("cognitiveatlas").unwrap().unwrap() {
            TermSetEntry::Nodes(nodes) => {
                assert_eq!(nodes["n1"].name, "somatosensation");
                assert_eq!(nodes["n1"].fields["type"], "concept");
            },
            other => panic!("unexpected entry {:?}", other),
        }
        assert_eq!(sets.get("neurosynth").unwrap().unwrap(), TermSetEntry::Flat(vec!["memory".to_string(), "pain".to_string()]));
    }

    #[test]
    fn missing_nodes_is_malformed() {
        let sets = TermSets::from_value(json!({"broken": {"edges": {}}})).unwrap();
        let err = sets.get("broken").unwrap().unwrap_err();
        assert!(matches!(err, Error::MalformedTermSet { ref tag, .. } if tag == "broken"));

        let sets = TermSets::from_value(json!({"nameless": {"nodes": {"n1": {"label": "x"}}}})).unwrap();
        assert!(sets.get("nameless").unwrap().is_err());
    }

    #[test]
    fn top_level_must_be_an_object() {
        assert!(matches!(TermSets::from_value(json!(["a"])), Err(Error::InvalidTermFile(_))));
    }

    #[test]
    fn merged_combines_every_tag() {
        let sets = TermSets::from_value(json!({
            "a": {"nodes": {"1": {"name": "attention"}, "2": {"name": "working memory"}}},
            "b": ["pain"]
        })).unwrap();

        let merged = sets.merged().unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged.names(), vec!["attention", "working memory", "pain"]);
    }
}
