use std::collections::BTreeMap;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use serde_json::Value;
use crate::error::{Error, Result};
use crate::matrix::{MatrixOptions, Strategy, UnknownTerms};
use crate::store::check_tag;

#[derive(Clone, Debug, PartialEq)]
pub struct TrainParams {
    pub vocab_size: usize,
    pub min_count: usize,
    pub min_sentence_len: usize,
    pub window_size: usize,
    pub max_iter: usize,
    pub embedding_dim: usize,
    pub learning_rate: f32,
    pub x_max: f32,
    pub alpha: f32,
    pub batch_size: usize,
    pub num_threads: usize,
    pub seed: Option<u64>,
    pub reuse_counts: bool,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            vocab_size: 400000,
            min_count: 40,
            min_sentence_len: 3,
            window_size: 10,
            max_iter: 50,
            embedding_dim: 300,
            learning_rate: 0.05,
            x_max: 100.0,
            alpha: 0.75,
            batch_size: 1,
            num_threads: 4,
            seed: None,
            reuse_counts: false,
        }
    }
}

impl Display for TrainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        vocab_size: {},
        min_count: {},
        min_sentence_len: {},
        window_size: {},
        max_iter: {},
        embedding_dim: {},
        learning_rate: {},
        x_max: {},
        alpha: {},
        batch_size: {},
        num_threads: {},
        seed: {:?},
        reuse_counts: {}",
        self.vocab_size, self.min_count, self.min_sentence_len, self.window_size, self.max_iter, self.embedding_dim,
        self.learning_rate, self.x_max, self.alpha, self.batch_size, self.num_threads, self.seed, self.reuse_counts
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Params {
    pub base_dir: PathBuf,
    pub corpora: BTreeMap<String, Vec<PathBuf>>,
    pub combined_tag: String,
    pub term_sets: Option<PathBuf>,
    pub reference_model: String,
    pub export_full: bool,
    pub reuse_models: bool,
    pub stemming: bool,
    pub matrix: MatrixOptions,
    pub train: TrainParams,
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        base_dir: {}
        corpora: {:?}
        combined_tag: {}
        term_sets: {:?}
        reference_model: {}
        export_full: {}
        reuse_models: {}
        stemming: {}
        matrix: {:?}
        {}",
        self.base_dir.display(), self.corpora.keys().collect::<Vec<_>>(), self.combined_tag, self.term_sets,
        self.reference_model, self.export_full, self.reuse_models, self.stemming, self.matrix, self.train)
    }
}

pub struct Config {
    params: Params
}

fn config_error(key: &str, expected: &str) -> Error {
    Error::Config(format!("'{}' must be {}", key, expected))
}

fn get_usize(json: &Value, key: &str, default: usize) -> Result<usize> {
    match json.get(key) {
        Some(value) => value.as_u64().map(|v| v as usize).ok_or_else(|| config_error(key, "a non-negative integer")),
        None => Ok(default),
    }
}

fn get_f32(json: &Value, key: &str, default: f32) -> Result<f32> {
    match json.get(key) {
        Some(value) => value.as_f64().map(|v| v as f32).ok_or_else(|| config_error(key, "numeric")),
        None => Ok(default),
    }
}

fn get_bool(json: &Value, key: &str, default: bool) -> Result<bool> {
    match json.get(key) {
        Some(value) => value.as_bool().ok_or_else(|| config_error(key, "a boolean")),
        None => Ok(default),
    }
}

fn get_str<'a>(json: &'a Value, key: &str) -> Result<Option<&'a str>> {
    match json.get(key) {
        Some(value) => value.as_str().map(Some).ok_or_else(|| config_error(key, "a string")),
        None => Ok(None),
    }
}

fn get_corpora(json: &Value) -> Result<BTreeMap<String, Vec<PathBuf>>> {

    let object = json.get("corpora")
        .and_then(Value::as_object)
        .ok_or_else(|| config_error("corpora", "an object mapping corpus ids to text files"))?;

    let mut corpora = BTreeMap::new();
    for (tag, files) in object {
        check_tag(tag)?;
        let files: Vec<PathBuf> = match files {
            Value::String(file) => vec![PathBuf::from(file)],
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_str().map(PathBuf::from).ok_or_else(|| config_error("corpora", "lists of file paths")))
                .collect::<Result<Vec<PathBuf>>>()?,
            _ => return Err(config_error("corpora", "lists of file paths")),
        };
        if files.is_empty() {
            return Err(Error::Config(format!("corpus '{}' has no files", tag)));
        }
        corpora.insert(tag.to_owned(), files);
    }

    if corpora.is_empty() {
        return Err(config_error("corpora", "non-empty"));
    }
    Ok(corpora)
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    /// Expects the program name followed by the path to a json file.
    pub fn new(args: &[String]) -> Result<Config> {
        if args.len() != 2 {
            return Err(Error::Config("input should be a path to json file only".to_string()));
        }
        Config::from_file(Path::new(&args[1]))
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let json: Value = serde_json::from_str(&content)?;
        Config::from_json(&json)
    }

    pub fn from_json(json: &Value) -> Result<Config> {

        let base_dir = get_str(json, "base_dir")?.ok_or_else(|| config_error("base_dir", "supplied"))?;
        let corpora = get_corpora(json)?;

        let combined_tag = get_str(json, "combined_tag")?.unwrap_or("all").to_string();
        check_tag(&combined_tag)?;
        if corpora.contains_key(&combined_tag) {
            return Err(Error::Config(format!("corpus id '{}' collides with the combined model tag", combined_tag)));
        }

        let reference_model = get_str(json, "reference_model")?.unwrap_or(combined_tag.as_str()).to_string();
        if reference_model != combined_tag && !corpora.contains_key(&reference_model) {
            return Err(Error::Config(format!("reference_model '{}' is not a configured corpus", reference_model)));
        }

        let strategy = match get_str(json, "matrix_strategy")? {
            None | Some("nearest") => Strategy::Nearest,
            Some("exact") => Strategy::Exact,
            Some(_) => return Err(config_error("matrix_strategy", "\"nearest\" or \"exact\"")),
        };
        let unknown_terms = match get_str(json, "unknown_terms")? {
            None | Some("fail") => UnknownTerms::Fail,
            Some("skip") => UnknownTerms::Skip,
            Some(_) => return Err(config_error("unknown_terms", "\"fail\" or \"skip\"")),
        };

        let defaults = TrainParams::default();
        let seed = match json.get("seed") {
            Some(seed) => Some(seed.as_u64().ok_or_else(|| config_error("seed", "a non-negative integer"))?),
            None => None,
        };
        let train = TrainParams {
            vocab_size: get_usize(json, "vocab_size", defaults.vocab_size)?,
            min_count: get_usize(json, "min_count", defaults.min_count)?,
            min_sentence_len: get_usize(json, "min_sentence_len", defaults.min_sentence_len)?,
            window_size: get_usize(json, "window_size", defaults.window_size)?,
            max_iter: get_usize(json, "max_iter", defaults.max_iter)?,
            embedding_dim: get_usize(json, "embedding_dim", defaults.embedding_dim)?,
            learning_rate: get_f32(json, "learning_rate", defaults.learning_rate)?,
            x_max: get_f32(json, "x_max", defaults.x_max)?,
            alpha: get_f32(json, "alpha", defaults.alpha)?,
            batch_size: get_usize(json, "batch_size", defaults.batch_size)?,
            num_threads: get_usize(json, "num_threads", defaults.num_threads)?,
            seed,
            reuse_counts: get_bool(json, "reuse_counts", defaults.reuse_counts)?,
        };

        for (key, value) in [
            ("vocab_size", train.vocab_size),
            ("window_size", train.window_size),
            ("embedding_dim", train.embedding_dim),
            ("batch_size", train.batch_size),
            ("num_threads", train.num_threads),
        ] {
            if value == 0 {
                return Err(config_error(key, "positive"));
            }
        }
        if train.x_max <= 0.0 || train.learning_rate <= 0.0 {
            return Err(config_error("x_max and learning_rate", "positive"));
        }

        let params = Params {
            base_dir: PathBuf::from(base_dir),
            corpora,
            combined_tag,
            term_sets: get_str(json, "term_sets")?.map(PathBuf::from),
            reference_model,
            export_full: get_bool(json, "export_full", true)?,
            reuse_models: get_bool(json, "reuse_models", false)?,
            stemming: get_bool(json, "stemming", true)?,
            matrix: MatrixOptions { strategy, unknown_terms },
            train,
        };

        Ok(Self { params })
    }
}
