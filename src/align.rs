use std::collections::{BTreeMap, BTreeSet, HashMap};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use crate::embedding::EmbeddingModel;
use crate::error::Error;
use crate::phrase::PhraseMatcher;
use crate::terms::{TermSetEntry, TermSets};

/// A term set name matched to an entry of a model vocabulary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentRecord {
    pub term_index: usize,
    pub vocab_index: usize,
    pub term: String,
    pub vocab_term: String,
}

/// Alignment results per tag. Tags that could not be read are in `failures`.
/// Records are tied to the model they were computed on and must be recomputed
/// when that model changes.
#[derive(Debug, Default)]
pub struct Alignment {
    pub records: BTreeMap<String, Vec<AlignmentRecord>>,
    pub failures: BTreeMap<String, Error>,
}

/// Aligns the names of one node set against `vocabulary`.
///
/// Names found verbatim in the vocabulary always keep their exact pairing,
/// whatever the matcher proposed for them.
pub fn align_names<P: PhraseMatcher + ?Sized>(names: &[String], vocabulary: &[String], matcher: &P) -> Vec<AlignmentRecord> {

    let vocab_index: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .rev() // first occurrence wins
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let mut by_term: BTreeMap<usize, AlignmentRecord> = BTreeMap::new();
    for record in matcher.find_phrases(names, vocabulary) {
        let consistent = names.get(record.term_index) == Some(&record.term)
            && vocabulary.get(record.vocab_index) == Some(&record.vocab_term);
        if consistent {
            by_term.entry(record.term_index).or_insert(record);
        } else {
            warn!("matcher returned a record that disagrees with its indices {:?}", record);
        }
    }

    for (term_index, name) in names.iter().enumerate() {
        if let Some(&vocab_index) = vocab_index.get(name.as_str()) {
            by_term.insert(term_index, AlignmentRecord {
                term_index,
                vocab_index,
                term: name.to_owned(),
                vocab_term: name.to_owned(),
            });
        }
    }

    by_term.into_values().collect()
}

/// Aligns one parsed entry. Flat lists carry no node names and give `None`.
pub fn align_entry<M, P>(entry: &TermSetEntry, model: &M, matcher: &P) -> Option<Vec<AlignmentRecord>>
where
    M: EmbeddingModel + ?Sized,
    P: PhraseMatcher + ?Sized,
{
    match entry {
        TermSetEntry::Nodes(_) => Some(align_names(&entry.names(), model.vocabulary(), matcher)),
        TermSetEntry::Flat(_) => None,
    }
}

/// Aligns every node-shaped term set against the vocabulary of `model`.
pub fn align<M, P>(term_sets: &TermSets, model: &M, matcher: &P) -> Alignment
where
    M: EmbeddingModel + ?Sized,
    P: PhraseMatcher + ?Sized,
{
    let mut alignment = Alignment::default();
    for (tag, entry) in term_sets.entries() {
        match entry {
            Ok(entry) => match align_entry(&entry, model, matcher) {
                Some(records) => {
                    info!("term set '{}': {} of {} names found in vocabulary", tag, records.len(), entry.len());
                    alignment.records.insert(tag.to_string(), records);
                },
                None => debug!("skipping flat term set '{}'", tag),
            },
            Err(e) => {
                warn!("{}", e);
                alignment.failures.insert(tag.to_string(), e);
            }
        }
    }
    alignment
}

/// Sorted distinct vocabulary terms of `records`, the restricted vocabulary for export.
pub fn unique_vocab(records: &[AlignmentRecord]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.vocab_term.to_owned())
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::embedding::WordVectors;
    use crate::phrase::StemMatcher;
    use ndarray::Array2;
    use serde_json::json;

    fn model(vocab: &[&str]) -> WordVectors {
        let w = Array2::from_shape_fn((vocab.len(), 2), |(i, j)| (i + j + 1) as f32);
        WordVectors::new(w, vocab.iter().map(|t| t.to_string()).collect()).unwrap()
    }

    /// Matcher that always proposes the first vocabulary entry.
    struct FirstEntry;

    impl PhraseMatcher for FirstEntry {
        fn find_phrases(&self, names: &[String], vocabulary: &[String]) -> Vec<AlignmentRecord> {
            names.iter().enumerate().map(|(i, name)| AlignmentRecord {
                term_index: i,
                vocab_index: 0,
                term: name.to_owned(),
                vocab_term: vocabulary[0].to_owned(),
            }).collect()
        }
    }

    #[test]
    fn stemmed_alignment() {
        let model = model(&["pain", "cortex", "somatosensory"]);
        let sets = TermSets::from_value(json!({"tag1": {"nodes": {"n1": {"name": "somatosensation"}}}})).unwrap();

        let alignment = align(&sets, &model, &StemMatcher::default());
        assert!(alignment.failures.is_empty());
        assert_eq!(alignment.records["tag1"], vec![AlignmentRecord {
            term_index: 0,
            vocab_index: 2,
            term: "somatosensation".to_string(),
            vocab_term: "somatosensory".to_string(),
        }]);
    }

    #[test]
    fn exact_names_are_never_missed() {
        let model = model(&["pain", "cortex", "memory"]);
        let names = vec!["memory".to_string(), "cortex".to_string(), "unrelated".to_string()];
        let records = align_names(&names, model.vocabulary(), &FirstEntry);

        assert_eq!(records.len(), 3);
        assert_eq!((records[0].vocab_index, records[0].vocab_term.as_str()), (2, "memory"));
        assert_eq!((records[1].vocab_index, records[1].vocab_term.as_str()), (1, "cortex"));
        // non exact names keep what the matcher proposed
        assert_eq!(records[2].vocab_term, "pain");
    }

    /// Matcher whose records point at the wrong entries.
    struct Shifted;

    impl PhraseMatcher for Shifted {
        fn find_phrases(&self, names: &[String], vocabulary: &[String]) -> Vec<AlignmentRecord> {
            vec![
                AlignmentRecord { term_index: 0, vocab_index: 1, term: names[0].to_owned(), vocab_term: vocabulary[0].to_owned() },
                AlignmentRecord { term_index: 1, vocab_index: 0, term: names[0].to_owned(), vocab_term: vocabulary[0].to_owned() },
                AlignmentRecord { term_index: 9, vocab_index: 0, term: names[0].to_owned(), vocab_term: vocabulary[0].to_owned() },
            ]
        }
    }

    #[test]
    fn inconsistent_matcher_records_are_dropped() {
        let model = model(&["pain", "cortex"]);
        let names = vec!["pains".to_string(), "cortices".to_string()];
        assert!(align_names(&names, model.vocabulary(), &Shifted).is_empty());
    }

    #[test]
    fn flat_sets_are_skipped_and_malformed_sets_reported() {
        let model = model(&["pain", "memory"]);
        let sets = TermSets::from_value(json!({
            "good": {"nodes": {"a": {"name": "pain"}, "b": {"name": "memories"}}},
            "flat": ["pain"],
            "broken": {"node": {}}
        })).unwrap();

        let alignment = align(&sets, &model, &StemMatcher::default());
        assert_eq!(alignment.records.keys().collect::<Vec<_>>(), vec!["good"]);
        assert_eq!(alignment.records["good"].len(), 2);
        assert!(matches!(alignment.failures.get("broken"), Some(Error::MalformedTermSet { .. })));
        assert!(!alignment.failures.contains_key("flat"));
    }

    #[test]
    fn unique_vocab_is_sorted_and_distinct() {
        let record = |i: usize, term: &str, vocab: &str| AlignmentRecord {
            term_index: i,
            vocab_index: 0,
            term: term.to_string(),
            vocab_term: vocab.to_string(),
        };
        let records = vec![record(0, "pains", "pain"), record(1, "memory", "memory"), record(2, "pain", "pain")];
        assert_eq!(unique_vocab(&records), vec!["memory", "pain"]);
    }
}
