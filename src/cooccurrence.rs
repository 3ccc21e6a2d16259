// imports
use crate::config::TrainParams;
use crate::error::{Error, Result};
use crate::files;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::ops::Range;
use std::path::{Path, PathBuf};
use ndarray::Array2;
use rayon::{prelude::*, ThreadPoolBuilder};
use tracing::{debug, info};

// pivot tokens handled by one slice; the worst case number of pairs is the square of this
const SLICE_SIZE: usize = 30000;
const VOCAB_FILE: &str = "vocab";

/// Vocabulary plus distance weighted co-occurrence counts, split by pivot token
/// slices. Each slice is an `(N, 3)` array of `[token, context, count]` rows,
/// counted one-sided (context to the right of the token).
#[derive(Clone, Debug, PartialEq)]
pub struct Cooccurrences {
    pub vocab: Vec<String>,
    pub slices: Vec<Array2<f32>>,
}

impl Cooccurrences {

    pub fn n_pairs(&self) -> usize {
        self.slices.iter().map(|s| s.dim().0).sum()
    }

    pub fn save(&self, output_dir: &Path) -> Result<()> {
        files::save_slices(output_dir, &self.slices)?;
        files::save_output(output_dir, VOCAB_FILE, &self.vocab)?;
        Ok(())
    }

    pub fn load(input_dir: &Path) -> Result<Cooccurrences> {
        let vocab = files::read_input::<Vec<String>>(input_dir, VOCAB_FILE)?;
        let slices = files::read_slices(input_dir)?;
        Ok(Self { vocab, slices })
    }

    pub fn is_cached(dir: &Path) -> bool {
        files::artifact_path(dir, VOCAB_FILE, "json").is_file()
    }
}

// defines the behavior needed for tokenizing a corpus
trait Tokenizer {
    fn tokenize(sequence: &str) -> Vec<String>;
}

pub struct Counts {}

impl Tokenizer for Counts {
    // split by whitespace, trim punctuation around words
    fn tokenize(sequence: &str) -> Vec<String> {
        sequence
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-' || c == '\'')))
            .filter(|w| !w.is_empty())
            .map(String::from)
            .collect()
    }
}

impl Counts {

    /// Lower cases a line and cuts it into tokenized sentences.
    pub fn parse_line(line: &str) -> Vec<Vec<String>> {
        line.to_lowercase()
            .split(['.', '!', '?'])
            .map(Counts::tokenize)
            .filter(|sentence| !sentence.is_empty())
            .collect()
    }

    /// Reads every file line by line, keeping sentences of at least `min_sentence_len` words.
    pub fn read_sentences(files: &[PathBuf], min_sentence_len: usize) -> Result<Vec<Vec<String>>> {

        let mut sentences = Vec::new();
        for file_path in files {
            let lines = BufReader::new(File::open(file_path)?).lines();
            for line in lines {
                sentences.extend(Counts::parse_line(&line?).into_iter().filter(|s| s.len() >= min_sentence_len));
            }
            debug!("read {}, {} sentences so far", file_path.display(), sentences.len());
        }
        Ok(sentences)
    }

    fn accumulate(sentences: &[Vec<String>]) -> HashMap<String, usize> {
        let mut token2count: HashMap<String, usize> = HashMap::new();
        for tok in sentences.iter().flatten() {
            *token2count.entry(tok.to_owned()).or_insert(0) += 1;
        }
        token2count
    }

    /// The `vocab_size` most frequent tokens seen at least `min_count` times, ties broken by token.
    pub fn build_vocab(token2count: &HashMap<String, usize>, vocab_size: usize, min_count: usize) -> Vec<String> {

        let mut tup = token2count
            .iter()
            .filter(|(_, count)| **count >= min_count)
            .collect::<Vec<(&String, &usize)>>();
        tup.sort_by(|(a, x), (b, y)| y.cmp(x).then_with(|| a.cmp(b)));
        tup.truncate(vocab_size);

        info!("using {} tokens out of {}", tup.len(), token2count.len());
        tup.into_iter().map(|(t, _)| t.to_owned()).collect()
    }

    /// Counts pairs whose pivot token index falls in `slice`, weighting each by 1 / distance.
    fn count(window_size: usize,
        sequences: &[Vec<String>],
        t2i: &HashMap<String, usize>,
        slice: &Range<usize>) -> HashMap<(usize, usize), f32> {

        let mut tup2cooc: HashMap<(usize, usize), f32> = HashMap::new();
        for sequence in sequences {

            let n = sequence.len();
            for (i, tok) in sequence.iter().enumerate() {

                let token_i = match t2i.get(tok) {
                    Some(token_i) if slice.contains(token_i) => *token_i,
                    _ => continue
                };

                for j in i + 1..=(i + window_size).min(n.saturating_sub(1)) {

                    let context_j = match t2i.get(&sequence[j]) {
                        Some(context_j) => *context_j,
                        None => continue
                    };

                    let distance = (j - i) as f32;
                    *tup2cooc.entry((token_i, context_j)).or_insert(0.0) += 1.0 / distance;
                }
            }
        }
        tup2cooc
    }

    // rows sorted by pair so a slice is reproducible
    fn to_ndarray(tup2cooc: &HashMap<(usize, usize), f32>) -> Array2<f32> {
        let mut pairs: Vec<(&(usize, usize), &f32)> = tup2cooc.iter().collect();
        pairs.sort_by_key(|(k, _)| **k);

        let mut nd_array: Array2<f32> = Array2::zeros((pairs.len(), 3));
        for (row, ((i, j), v)) in pairs.into_iter().enumerate() {
            nd_array[[row, 0]] = *i as f32;
            nd_array[[row, 1]] = *j as f32;
            nd_array[[row, 2]] = *v;
        }
        nd_array
    }

    /// Builds the vocabulary of `sentences` and counts co-occurrences, one vocabulary slice per task.
    pub fn run(tag: &str, sentences: &[Vec<String>], params: &TrainParams) -> Result<Cooccurrences> {

        let token2count = Counts::accumulate(sentences);
        let vocab = Counts::build_vocab(&token2count, params.vocab_size, params.min_count);
        if vocab.is_empty() {
            return Err(Error::EmptyCorpus(tag.to_string()));
        }
        let t2i: HashMap<String, usize> = vocab.iter().enumerate().map(|(i, t)| (t.to_owned(), i)).collect();

        let slices: Vec<Range<usize>> = (0..vocab.len()).step_by(SLICE_SIZE).map(|i| i..i + SLICE_SIZE).collect();
        let pool = ThreadPoolBuilder::new().num_threads(params.num_threads).build()?;
        let counted: Vec<Array2<f32>> = pool.install(|| {
            slices.par_iter().enumerate().map(|(thread_i, slice)| {
                debug!("thread {}, working on vocab slice {:?}", thread_i, slice);
                let tup2cooc = Counts::count(params.window_size, sentences, &t2i, slice);
                debug!("thread {} found {} pairs", thread_i, tup2cooc.len());
                Counts::to_ndarray(&tup2cooc)
            }).collect()
        });

        let cooc = Cooccurrences { vocab, slices: counted };
        info!("corpus '{}': {} sentences, {} terms, {} co-occurring pairs", tag, sentences.len(), cooc.vocab.len(), cooc.n_pairs());
        Ok(cooc)
    }
}
