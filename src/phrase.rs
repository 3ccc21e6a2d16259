use std::collections::HashMap;
use crate::align::AlignmentRecord;

/// Finds vocabulary entries for candidate names.
///
/// Returned records carry `(name index, vocabulary index, name, vocabulary term)`.
pub trait PhraseMatcher: Sync {
    fn find_phrases(&self, names: &[String], vocabulary: &[String]) -> Vec<AlignmentRecord>;
}

// longest first, only the first match is stripped in a pass
const SUFFIXES: [&str; 10] = [
    "ational", "ation", "ness", "ment", "ion", "ory", "ing", "ed", "al", "y",
];
const MIN_STEM: usize = 3;
const PASSES: usize = 2;

// plural endings: "sses" -> "ss", "ies" -> "y", a single trailing "s" is dropped
fn singular(word: &str) -> String {

    if let Some(rest) = word.strip_suffix("sses") {
        return format!("{}ss", rest);
    }
    if let Some(rest) = word.strip_suffix("ies") {
        if rest.chars().count() + 1 >= MIN_STEM {
            return format!("{}y", rest);
        }
    }
    match word.strip_suffix('s') {
        Some(rest) if !rest.ends_with('s') && rest.chars().count() >= MIN_STEM => rest.to_string(),
        _ => word.to_string(),
    }
}

/// Light suffix stripping, enough to bring "somatosensation" and "somatosensory",
/// or "responses" and "response", together.
pub fn stem(word: &str) -> String {

    let mut stem = singular(&word.to_lowercase());
    for _ in 0..PASSES {
        let stripped = SUFFIXES.iter().find_map(|suffix| {
            stem.strip_suffix(*suffix)
                .filter(|rest| rest.chars().count() >= MIN_STEM)
                .map(String::from)
        });
        match stripped {
            Some(shorter) => stem = shorter,
            None => break,
        }
    }
    if stem.ends_with('e') && stem.chars().count() > MIN_STEM {
        stem.pop();
    }
    stem
}

fn words(phrase: &str) -> impl Iterator<Item = String> + '_ {
    phrase
        .split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Matches names to vocabulary entries by exact text, then by normalised
/// phrase ("Working memory" ~ "working_memory"), then by stemmed phrase.
#[derive(Clone, Copy, Debug)]
pub struct StemMatcher {
    pub stemming: bool,
}

impl Default for StemMatcher {
    fn default() -> Self {
        Self { stemming: true }
    }
}

impl StemMatcher {

    pub fn phrase_key(phrase: &str) -> String {
        words(phrase).collect::<Vec<String>>().join(" ")
    }

    pub fn stem_key(phrase: &str) -> String {
        words(phrase).map(|w| stem(&w)).collect::<Vec<String>>().join(" ")
    }

    // among candidates of one kind: closest length, then lowest index
    fn pick(candidates: &[usize], name: &str, vocabulary: &[String]) -> Option<usize> {
        candidates
            .iter()
            .copied()
            .min_by_key(|&i| (vocabulary[i].len().abs_diff(name.len()), i))
    }
}

impl PhraseMatcher for StemMatcher {

    fn find_phrases(&self, names: &[String], vocabulary: &[String]) -> Vec<AlignmentRecord> {

        let mut exact: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut by_phrase: HashMap<String, Vec<usize>> = HashMap::new();
        let mut by_stem: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, term) in vocabulary.iter().enumerate() {
            exact.entry(term.as_str()).or_default().push(i);
            let key = StemMatcher::phrase_key(term);
            if key.is_empty() {
                continue;
            }
            by_phrase.entry(key).or_default().push(i);
            if self.stemming {
                by_stem.entry(StemMatcher::stem_key(term)).or_default().push(i);
            }
        }

        let mut records: Vec<AlignmentRecord> = Vec::new();
        for (term_index, name) in names.iter().enumerate() {

            // nothing but separators
            let key = StemMatcher::phrase_key(name);
            if key.is_empty() {
                continue;
            }

            let hit = exact.get(name.as_str())
                .and_then(|c| StemMatcher::pick(c, name, vocabulary))
                .or_else(|| by_phrase.get(&key).and_then(|c| StemMatcher::pick(c, name, vocabulary)))
                .or_else(|| {
                    if !self.stemming { return None; }
                    by_stem.get(&StemMatcher::stem_key(name)).and_then(|c| StemMatcher::pick(c, name, vocabulary))
                });

            if let Some(vocab_index) = hit {
                records.push(AlignmentRecord {
                    term_index,
                    vocab_index,
                    term: name.to_owned(),
                    vocab_term: vocabulary[vocab_index].to_owned(),
                });
            }
        }

        records
    }
}
