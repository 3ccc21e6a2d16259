use std::collections::HashMap;
use ndarray::prelude::*;
use crate::error::{Error, Result};

/// Read-only view of a trained embedding space.
///
/// Implementors must answer similarity queries deterministically: the matrix
/// builder relies on repeated queries returning the same scores.
pub trait EmbeddingModel: Sync {

    /// Vocabulary in index order.
    fn vocabulary(&self) -> &[String];

    fn contains(&self, term: &str) -> bool;

    /// The `topn` terms most similar to `term`, best first. The term itself is never returned.
    fn most_similar(&self, term: &str, topn: usize) -> Result<Vec<(String, f32)>>;

    /// Similarity score between two in-vocabulary terms.
    fn similarity(&self, a: &str, b: &str) -> Result<f32>;

    /// Dense `terms x terms` similarity table.
    fn pairwise(&self, terms: &[String]) -> Result<Array2<f32>> {
        let n = terms.len();
        let mut scores = Array2::zeros((n, n));
        for (i, a) in terms.iter().enumerate() {
            for (j, b) in terms.iter().enumerate() {
                scores[[i, j]] = self.similarity(a, b)?;
            }
        }
        Ok(scores)
    }
}

/// Word vectors with unit-length rows, so every dot product is a cosine similarity.
#[derive(Clone, Debug)]
pub struct WordVectors {
    w: Array2<f32>,
    t2i: HashMap<String, usize>,
    i2t: Vec<String>,
}

impl WordVectors {

    pub fn new(mut w: Array2<f32>, vocab: Vec<String>) -> Result<WordVectors> {

        if w.dim().0 != vocab.len() {
            return Err(Error::InvalidModel(format!(
                "{} vectors for {} vocabulary entries", w.dim().0, vocab.len()
            )));
        }

        let mut t2i: HashMap<String, usize> = HashMap::with_capacity(vocab.len());
        for (i, t) in vocab.iter().enumerate() {
            if t2i.insert(t.to_owned(), i).is_some() {
                return Err(Error::InvalidModel(format!("duplicate vocabulary entry '{}'", t)));
            }
        }

        // normalize w so each row has l2 norm 1, zero rows stay zero
        for mut row in w.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        Ok(Self { w, t2i, i2t: vocab })
    }

    /// Builds from a token -> row map, the layout the trainer saves its vocabulary in.
    pub fn from_t2i(w: Array2<f32>, t2i: HashMap<String, usize>) -> Result<WordVectors> {

        let mut i2t: Vec<Option<String>> = vec![None; t2i.len()];
        for (t, i) in t2i {
            match i2t.get_mut(i) {
                Some(slot) if slot.is_none() => *slot = Some(t),
                _ => return Err(Error::InvalidModel(format!("vocabulary index {} is out of range or repeated", i))),
            }
        }

        let vocab = i2t.into_iter().collect::<Option<Vec<String>>>()
            .ok_or_else(|| Error::InvalidModel("vocabulary indices are not contiguous".to_string()))?;
        WordVectors::new(w, vocab)
    }

    pub fn weights(&self) -> &Array2<f32> {
        &self.w
    }

    pub fn len(&self) -> usize {
        self.i2t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.i2t.is_empty()
    }

    pub fn embedding_dim(&self) -> usize {
        self.w.dim().1
    }

    fn index_of(&self, token: &str) -> Result<usize> {
        self.t2i.get(token).copied().ok_or_else(|| Error::UnknownTerm(token.to_string()))
    }

    pub fn vector(&self, token: &str) -> Result<ArrayView1<f32>> {
        let i = self.index_of(token)?;
        Ok(self.w.row(i))
    }

    /// Ranks every vocabulary entry against `vec`, skipping `exclude`, and keeps the best `k`.
    pub fn find_k_most_similar(&self, vec: &ArrayView1<f32>, k: usize, exclude: &[usize]) -> Vec<(String, f32)> {

        let scores = self.w.dot(vec);
        let mut indexed_scores: Vec<(usize, f32)> = scores
            .iter()
            .copied()
            .enumerate()
            .filter(|(i, _)| !exclude.contains(i))
            .collect();

        // stable sort: equal scores keep vocabulary order
        indexed_scores.sort_by(|(_, s), (_, t)| t.total_cmp(s));
        indexed_scores.truncate(k);

        indexed_scores
            .into_iter()
            .map(|(i, score)| (self.i2t[i].to_owned(), score))
            .collect()
    }

    fn mean_direction(&self, positive: &[&str], negative: &[&str]) -> Result<(Array1<f32>, Vec<usize>)> {

        if positive.is_empty() && negative.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let mut mean: Array1<f32> = Array1::zeros(self.embedding_dim());
        let mut used: Vec<usize> = Vec::new();
        for (words, sign) in [(positive, 1.0f32), (negative, -1.0f32)] {
            for word in words {
                let i = self.index_of(word)?;
                mean.scaled_add(sign, &self.w.row(i));
                used.push(i);
            }
        }

        let norm = mean.dot(&mean).sqrt();
        if norm > 0.0 {
            mean.mapv_inplace(|a| a / norm);
        }
        Ok((mean, used))
    }

    /// "a is to b as c is to ?" with positive = [b, c] and negative = [a].
    pub fn analogy(&self, positive: &[&str], negative: &[&str], topn: usize) -> Result<Vec<(String, f32)>> {
        let (direction, used) = self.mean_direction(positive, negative)?;
        Ok(self.find_k_most_similar(&direction.view(), topn, &used))
    }

    /// The word furthest from the mean of all given words.
    pub fn doesnt_match(&self, words: &[&str]) -> Result<String> {

        let (direction, used) = self.mean_direction(words, &[])?;
        let mut odd: Option<(usize, f32)> = None;
        for i in used {
            let score = self.w.row(i).dot(&direction);
            if odd.map_or(true, |(_, best)| score < best) {
                odd = Some((i, score));
            }
        }

        odd.map(|(i, _)| self.i2t[i].to_owned()).ok_or(Error::EmptyQuery)
    }
}

impl EmbeddingModel for WordVectors {

    fn vocabulary(&self) -> &[String] {
        &self.i2t
    }

    fn contains(&self, term: &str) -> bool {
        self.t2i.contains_key(term)
    }

    fn most_similar(&self, term: &str, topn: usize) -> Result<Vec<(String, f32)>> {
        let i = self.index_of(term)?;
        Ok(self.find_k_most_similar(&self.w.row(i), topn, &[i]))
    }

    fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        Ok(self.vector(a)?.dot(&self.vector(b)?))
    }

    fn pairwise(&self, terms: &[String]) -> Result<Array2<f32>> {
        let indices = terms.iter().map(|t| self.index_of(t)).collect::<Result<Vec<usize>>>()?;
        let sub = self.w.select(Axis(0), &indices);
        Ok(sub.dot(&sub.t()))
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    fn toy_vectors() -> WordVectors {
        let w = array![
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.1, 0.9, 0.0],
            [0.0, 0.0, 2.0]
        ];
        let vocab = ["dog", "car", "puppy", "truck", "sky"].map(String::from).to_vec();
        WordVectors::new(w, vocab).unwrap()
    }

    #[test]
    fn rows_are_unit_length() {
        let wv = toy_vectors();
        for row in wv.weights().axis_iter(Axis(0)) {
            assert!((row.dot(&row) - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn most_similar_excludes_self_and_is_sorted() {
        let wv = toy_vectors();
        let sims = wv.most_similar("dog", 4).unwrap();
        assert_eq!(sims.len(), 4);
        assert_eq!(sims[0].0, "puppy");
        assert!(sims.iter().all(|(t, _)| t != "dog"));
        assert!(sims.windows(2).all(|p| p[0].1 >= p[1].1));
    }

    #[test]
    fn most_similar_unknown_term() {
        let wv = toy_vectors();
        assert!(matches!(wv.most_similar("cat", 3), Err(Error::UnknownTerm(t)) if t == "cat"));
    }

    #[test]
    fn pairwise_matches_similarity() {
        let wv = toy_vectors();
        let terms = ["dog", "puppy", "sky"].map(String::from).to_vec();
        let table = wv.pairwise(&terms).unwrap();
        for (i, a) in terms.iter().enumerate() {
            for (j, b) in terms.iter().enumerate() {
                assert!((table[[i, j]] - wv.similarity(a, b).unwrap()).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn analogy_and_odd_one_out() {
        let wv = toy_vectors();
        // puppy - dog + car lands near truck
        let best = wv.analogy(&["puppy", "car"], &["dog"], 1).unwrap();
        assert_eq!(best[0].0, "truck");
        assert_eq!(wv.doesnt_match(&["dog", "puppy", "sky"]).unwrap(), "sky");
        assert!(matches!(wv.doesnt_match(&[]), Err(Error::EmptyQuery)));
    }

    #[test]
    fn rejects_inconsistent_vocabularies() {
        let w = Array2::<f32>::zeros((2, 3));
        assert!(WordVectors::new(w.clone(), vec!["a".to_string()]).is_err());
        assert!(WordVectors::new(w.clone(), vec!["a".to_string(), "a".to_string()]).is_err());

        let mut t2i = HashMap::new();
        t2i.insert("a".to_string(), 0);
        t2i.insert("b".to_string(), 2);
        assert!(WordVectors::from_t2i(w, t2i).is_err());
    }
}
