use std::collections::{HashMap, HashSet};
use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use crate::embedding::EmbeddingModel;
use crate::error::{Error, Result};

/// How the cells of a row are obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// One nearest-neighbour query per row with `topn` = subset size. Cells for
    /// terms outside the returned neighbours stay unset.
    #[default]
    Nearest,
    /// Direct pairwise cosine on the stored vectors. Every off-diagonal cell is set.
    Exact,
}

/// What to do with requested terms the model has never seen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownTerms {
    #[default]
    Fail,
    Skip,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MatrixOptions {
    pub strategy: Strategy,
    pub unknown_terms: UnknownTerms,
}

/// Term x term similarity table. A `None` cell means the column term was not
/// among the neighbours returned for the row term, not a similarity of zero.
#[derive(Clone, Debug, PartialEq)]
pub struct SimilarityMatrix {
    rows: Vec<String>,
    columns: Vec<String>,
    cells: Array2<Option<f32>>,
}

impl SimilarityMatrix {

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn cells(&self) -> &Array2<Option<f32>> {
        &self.cells
    }

    pub fn get(&self, row: &str, column: &str) -> Option<f32> {
        let i = self.rows.iter().position(|t| t == row)?;
        let j = self.columns.iter().position(|t| t == column)?;
        self.cells[[i, j]]
    }

    /// Number of cells holding a score.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }
}

// keeps first occurrences, in request order
fn resolve_terms<M: EmbeddingModel + ?Sized>(model: &M, vocab: Option<&[String]>, unknown_terms: UnknownTerms) -> Result<Vec<String>> {

    let requested = vocab.unwrap_or_else(|| model.vocabulary());
    let mut seen: HashSet<&str> = HashSet::with_capacity(requested.len());
    let mut terms: Vec<String> = Vec::with_capacity(requested.len());

    for term in requested {
        if !seen.insert(term.as_str()) {
            continue;
        }
        if !model.contains(term) {
            match unknown_terms {
                UnknownTerms::Fail => return Err(Error::UnknownTerm(term.to_owned())),
                UnknownTerms::Skip => {
                    warn!("dropping '{}', not in model vocabulary", term);
                    continue;
                }
            }
        }
        terms.push(term.to_owned());
    }

    Ok(terms)
}

/// Builds the similarity table of `vocab` (the whole model vocabulary when `None`).
///
/// This is the expensive step of the pipeline: with [`Strategy::Nearest`] every
/// row costs a ranking of the full vocabulary. Rows are computed in parallel,
/// row order is the order of `vocab`.
pub fn build_matrix<M: EmbeddingModel + ?Sized>(model: &M, vocab: Option<&[String]>, options: &MatrixOptions) -> Result<SimilarityMatrix> {

    let terms = resolve_terms(model, vocab, options.unknown_terms)?;
    let n = terms.len();
    info!("building {} x {} similarity matrix ({:?})", n, n, options.strategy);

    let cells: Array2<Option<f32>> = match options.strategy {
        Strategy::Nearest => {

            let columns: HashMap<&str, usize> = terms.iter().enumerate().map(|(j, t)| (t.as_str(), j)).collect();
            let rows = terms.par_iter().enumerate().map(|(i, term)| -> Result<Vec<Option<f32>>> {

                debug!("parsing {} of {}: {}", i + 1, n, term);
                let mut row: Vec<Option<f32>> = vec![None; n];
                for (candidate, score) in model.most_similar(term, n)? {
                    if let Some(&j) = columns.get(candidate.as_str()) {
                        row[j] = Some(score);
                    }
                }
                Ok(row)

            }).collect::<Result<Vec<Vec<Option<f32>>>>>()?;

            Array2::from_shape_vec((n, n), rows.into_iter().flatten().collect())?
        },
        Strategy::Exact => {
            let scores = model.pairwise(&terms)?;
            Array2::from_shape_fn((n, n), |(i, j)| if i == j { None } else { Some(scores[[i, j]]) })
        }
    };

    Ok(SimilarityMatrix { rows: terms.clone(), columns: terms, cells })
}


#[cfg(test)]
pub(crate) mod tests {

    use super::*;
    use crate::embedding::WordVectors;
    use ndarray::array;

    /// Model answering from fixed neighbour lists.
    pub(crate) struct FixedModel {
        vocab: Vec<String>,
        neighbours: HashMap<String, Vec<(String, f32)>>,
    }

    impl FixedModel {
        pub(crate) fn new(entries: &[(&str, &[(&str, f32)])]) -> Self {
            let vocab = entries.iter().map(|(t, _)| t.to_string()).collect();
            let neighbours = entries
                .iter()
                .map(|(t, ns)| (t.to_string(), ns.iter().map(|(n, s)| (n.to_string(), *s)).collect()))
                .collect();
            Self { vocab, neighbours }
        }
    }

    impl EmbeddingModel for FixedModel {
        fn vocabulary(&self) -> &[String] {
            &self.vocab
        }
        fn contains(&self, term: &str) -> bool {
            self.neighbours.contains_key(term)
        }
        fn most_similar(&self, term: &str, topn: usize) -> Result<Vec<(String, f32)>> {
            let ns = self.neighbours.get(term).ok_or_else(|| Error::UnknownTerm(term.to_string()))?;
            Ok(ns.iter().take(topn).cloned().collect())
        }
        fn similarity(&self, a: &str, b: &str) -> Result<f32> {
            let ns = self.neighbours.get(a).ok_or_else(|| Error::UnknownTerm(a.to_string()))?;
            Ok(ns.iter().find(|(t, _)| t == b).map_or(0.0, |(_, s)| *s))
        }
    }

    fn pets() -> FixedModel {
        FixedModel::new(&[
            ("dog", &[("puppy", 0.9), ("cat", 0.5)]),
            ("cat", &[("puppy", 0.6), ("dog", 0.5)]),
            ("puppy", &[("dog", 0.9), ("cat", 0.6)]),
        ])
    }

    fn strings(terms: &[&str]) -> Vec<String> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn full_vocabulary_matrix() {
        let model = pets();
        let matrix = build_matrix(&model, None, &MatrixOptions::default()).unwrap();

        assert_eq!(matrix.rows(), &strings(&["dog", "cat", "puppy"])[..]);
        assert_eq!(matrix.columns(), matrix.rows());
        assert_eq!(matrix.get("dog", "puppy"), Some(0.9));
        assert_eq!(matrix.get("dog", "cat"), Some(0.5));
        assert_eq!(matrix.get("dog", "dog"), None);
        assert_eq!(matrix.filled(), 6);
    }

    #[test]
    fn neighbours_outside_top_k_stay_unset() {
        let model = FixedModel::new(&[
            ("dog", &[("puppy", 0.9), ("wolf", 0.8), ("cat", 0.5)]),
            ("cat", &[("kitten", 0.9), ("dog", 0.5)]),
            ("puppy", &[("dog", 0.9)]),
            ("wolf", &[("dog", 0.8)]),
            ("kitten", &[("cat", 0.9)]),
        ]);
        let subset = strings(&["dog", "cat"]);
        let matrix = build_matrix(&model, Some(&subset), &MatrixOptions::default()).unwrap();

        // topn = 2 only reaches puppy and wolf for "dog"
        assert_eq!(matrix.get("dog", "cat"), None);
        // "cat" reaches "dog" within its top 2
        assert_eq!(matrix.get("cat", "dog"), Some(0.5));
        assert_eq!(matrix.filled(), 1);
    }

    #[test]
    fn labels_stay_within_subset_and_vocabulary() {
        let model = pets();
        let subset = strings(&["cat", "lion", "dog", "cat"]);
        let options = MatrixOptions { unknown_terms: UnknownTerms::Skip, ..Default::default() };
        let matrix = build_matrix(&model, Some(&subset), &options).unwrap();

        assert_eq!(matrix.rows(), &strings(&["cat", "dog"])[..]);
        for label in matrix.rows().iter().chain(matrix.columns()) {
            assert!(subset.contains(label) && model.contains(label));
        }
        assert_eq!(matrix.get("cat", "puppy"), None);
    }

    #[test]
    fn unknown_terms_fail_by_default() {
        let model = pets();
        let subset = strings(&["cat", "lion"]);
        let result = build_matrix(&model, Some(&subset), &MatrixOptions::default());
        assert!(matches!(result, Err(Error::UnknownTerm(t)) if t == "lion"));
    }

    #[test]
    fn repeated_builds_are_identical() {
        let model = pets();
        let first = build_matrix(&model, None, &MatrixOptions::default()).unwrap();
        let second = build_matrix(&model, None, &MatrixOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn exact_strategy_fills_off_diagonal() {
        let w = array![[1.0, 0.0], [0.8, 0.6], [0.0, 1.0], [-1.0, 0.0]];
        let model = WordVectors::new(w, strings(&["a", "b", "c", "d"])).unwrap();
        let subset = strings(&["a", "b", "c"]);
        let options = MatrixOptions { strategy: Strategy::Exact, ..Default::default() };
        let matrix = build_matrix(&model, Some(&subset), &options).unwrap();

        assert_eq!(matrix.filled(), 6);
        assert_eq!(matrix.get("a", "a"), None);
        assert!((matrix.get("a", "b").unwrap() - 0.8).abs() < 1e-6);
        assert_eq!(matrix.get("b", "c"), matrix.get("c", "b"));

        // same scores as the neighbour queries, which reach every subset term here
        let nearest = build_matrix(&model, Some(&subset), &MatrixOptions::default()).unwrap();
        for (i, j) in [(0, 1), (0, 2), (1, 2)] {
            let (r, c) = (&subset[i], &subset[j]);
            assert!((matrix.get(r, c).unwrap() - nearest.get(r, c).unwrap()).abs() < 1e-6);
        }
    }
}
