use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use ndarray::Array2;
use tracing::info;
use crate::embedding::{EmbeddingModel, WordVectors};
use crate::error::{Error, Result};
use crate::files::{self, artifact_path};

/// Directory under the project root holding models and exported tables.
pub const MODELS_DIR: &str = "analysis/models";
const VOCAB_SUFFIX: &str = "vocab";

/// Persistent registry of trained models, keyed by tag.
pub trait ModelStore {
    fn load(&self, tag: &str) -> Result<WordVectors>;
    fn save(&self, tag: &str, model: &WordVectors) -> Result<()>;
    fn list(&self) -> Result<BTreeSet<String>>;
}

pub fn models_dir(base_dir: &Path) -> PathBuf {
    base_dir.join(MODELS_DIR)
}

/// Tags become file names, so they may not be empty or walk the directory tree.
pub fn check_tag(tag: &str) -> Result<()> {
    if tag.is_empty() || tag == "." || tag == ".." || tag.contains(['/', '\\']) {
        return Err(Error::InvalidTag(tag.to_string()));
    }
    Ok(())
}

/// Stores `<tag>.npy` (vectors) next to `<tag>.vocab.json` (vocabulary in row order).
#[derive(Clone, Debug)]
pub struct DirModelStore {
    dir: PathBuf,
}

impl DirModelStore {

    pub fn new(base_dir: &Path) -> DirModelStore {
        Self { dir: models_dir(base_dir) }
    }

    fn vocab_name(tag: &str) -> String {
        format!("{}.{}", tag, VOCAB_SUFFIX)
    }

    pub fn contains(&self, tag: &str) -> bool {
        artifact_path(&self.dir, tag, "npy").is_file()
            && artifact_path(&self.dir, &DirModelStore::vocab_name(tag), "json").is_file()
    }
}

impl ModelStore for DirModelStore {

    fn load(&self, tag: &str) -> Result<WordVectors> {
        check_tag(tag)?;
        if !self.contains(tag) {
            return Err(Error::InvalidModel(format!("no stored model '{}' in {}", tag, self.dir.display())));
        }
        let w = files::read_input::<Array2<f32>>(&self.dir, tag)?;
        let vocab = files::read_input::<Vec<String>>(&self.dir, &DirModelStore::vocab_name(tag))?;
        WordVectors::new(w, vocab)
    }

    fn save(&self, tag: &str, model: &WordVectors) -> Result<()> {
        check_tag(tag)?;
        files::save_output(&self.dir, tag, model.weights())?;
        files::save_output(&self.dir, &DirModelStore::vocab_name(tag), &model.vocabulary().to_vec())?;
        info!("saved model '{}' ({} terms) to {}", tag, model.len(), self.dir.display());
        Ok(())
    }

    fn list(&self) -> Result<BTreeSet<String>> {
        if !self.dir.is_dir() {
            return Ok(BTreeSet::new());
        }

        let mut tags = BTreeSet::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("npy") {
                continue;
            }
            if let Some(tag) = path.file_stem().and_then(|s| s.to_str()) {
                if self.contains(tag) {
                    tags.insert(tag.to_string());
                }
            }
        }
        Ok(tags)
    }
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    #[test]
    fn save_list_load() {
        let base = tempfile::tempdir().unwrap();
        let store = DirModelStore::new(base.path());
        assert!(store.list().unwrap().is_empty());

        let w = array![[1.0, 0.0], [0.0, 2.0]];
        let model = WordVectors::new(w, vec!["pain".to_string(), "memory".to_string()]).unwrap();
        store.save("neurosynth", &model).unwrap();
        store.save("all", &model).unwrap();

        assert_eq!(store.list().unwrap().into_iter().collect::<Vec<_>>(), vec!["all", "neurosynth"]);
        let loaded = store.load("neurosynth").unwrap();
        assert_eq!(loaded.vocabulary(), model.vocabulary());
        assert_eq!(loaded.weights(), model.weights());
        assert!(base.path().join("analysis/models/neurosynth.vocab.json").is_file());
    }

    #[test]
    fn missing_and_invalid_tags() {
        let base = tempfile::tempdir().unwrap();
        let store = DirModelStore::new(base.path());
        assert!(matches!(store.load("absent"), Err(Error::InvalidModel(_))));
        assert!(matches!(store.load("../escape"), Err(Error::InvalidTag(_))));
        assert!(check_tag("").is_err());
        assert!(check_tag("neurosynth_all").is_ok());
    }
}
