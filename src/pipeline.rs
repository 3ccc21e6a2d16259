// imports
use crate::align::{align, align_entry, unique_vocab};
use crate::config::Params;
use crate::cooccurrence::{Cooccurrences, Counts};
use crate::embedding::WordVectors;
use crate::error::{Error, Result};
use crate::export::{export_models, ExportReport};
use crate::files::ReadFile;
use crate::phrase::StemMatcher;
use crate::store::{DirModelStore, ModelStore};
use crate::terms::TermSets;
use crate::train::Glove;

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// What a pipeline run produced.
#[derive(Debug, Default)]
pub struct PipelineReport {
    /// Tags of every model used, trained or loaded.
    pub models: Vec<String>,
    pub exports: ExportReport,
    /// Term sets that could not be aligned, by tag.
    pub alignment_failures: BTreeMap<String, Error>,
    /// Set when no term set table could be made at all, e.g. the term set file is unreadable.
    pub term_sets_failure: Option<Error>,
}

impl PipelineReport {
    pub fn is_complete(&self) -> bool {
        self.exports.is_complete() && self.alignment_failures.is_empty() && self.term_sets_failure.is_none()
    }
}

pub struct Pipeline {}

impl Pipeline {

    // runs the procedure in 3 steps -
    // -> one model per corpus and one for all corpora combined
    // -> similarity tables of every model
    // -> alignment of the term sets with the reference model, and tables restricted to the matched terms

    pub fn run(params: &Params) -> Result<PipelineReport> {

        info!("{}", params);
        let store = DirModelStore::new(&params.base_dir);
        let mut report = PipelineReport::default();
        let models = Pipeline::models(params, &store)?;
        report.models = models.keys().cloned().collect();

        if params.export_full {
            let timer = Instant::now();
            let pairs: Vec<(&str, &WordVectors)> = models.iter().map(|(tag, model)| (tag.as_str(), model)).collect();
            report.exports.extend(export_models(&params.base_dir, &pairs, None, &params.matrix)?);
            info!("exported full tables, took {} seconds ...", timer.elapsed().as_secs());
        }

        // the full tables are kept whatever happens to the term sets
        if params.term_sets.is_some() {
            if let Err(e) = Pipeline::term_set_tables(params, &models, &mut report) {
                warn!("no term set tables: {}", e);
                report.term_sets_failure = Some(e);
            }
        }

        Ok(report)
    }

    fn models(params: &Params, store: &DirModelStore) -> Result<BTreeMap<String, WordVectors>> {

        let stored = |tag: &str| params.reuse_models && store.contains(tag);
        let need_combined = !stored(params.combined_tag.as_str());

        let mut models = BTreeMap::new();
        let mut combined: Vec<Vec<String>> = Vec::new();
        for (tag, files) in &params.corpora {

            if stored(tag.as_str()) && !need_combined {
                info!("loading stored model for corpus {}", tag);
                models.insert(tag.to_owned(), store.load(tag)?);
                continue;
            }

            let sentences = Counts::read_sentences(files, params.train.min_sentence_len)?;
            if stored(tag.as_str()) {
                models.insert(tag.to_owned(), store.load(tag)?);
            } else {
                info!("training model for corpus {}", tag);
                let model = Pipeline::train(tag, &sentences, params)?;
                store.save(tag, &model)?;
                models.insert(tag.to_owned(), model);
            }
            combined.extend(sentences);
        }

        let tag = &params.combined_tag;
        let model = if need_combined {
            info!("training model for all corpora combined");
            let model = Pipeline::train(tag, &combined, params)?;
            store.save(tag, &model)?;
            model
        } else {
            info!("loading stored combined model {}", tag);
            store.load(tag)?
        };
        models.insert(tag.to_owned(), model);

        Ok(models)
    }

    fn train(tag: &str, sentences: &[Vec<String>], params: &Params) -> Result<WordVectors> {

        let timer = Instant::now();
        let cooc_dir = params.base_dir.join("analysis").join("cooc").join(tag);

        // run the cooccurrences count stage if not saved already
        let cooc = if params.train.reuse_counts && Cooccurrences::is_cached(&cooc_dir) {
            info!("loading saved cooccurrences for {}", tag);
            Cooccurrences::load(&cooc_dir)?
        } else {
            let cooc = Counts::run(tag, sentences, &params.train)?;
            cooc.save(&cooc_dir)?;
            cooc
        };

        let (model, train_report) = Glove::fit(&cooc, &params.train)?;
        info!(
            "trained '{}' on {} pairs, final loss {:?}, took {} seconds ...",
            tag, cooc.n_pairs(), train_report.epoch_losses.last(), timer.elapsed().as_secs()
        );
        Ok(model)
    }

    fn term_set_tables(params: &Params, models: &BTreeMap<String, WordVectors>, report: &mut PipelineReport) -> Result<()> {

        let path = match &params.term_sets {
            Some(path) => path,
            None => return Ok(()),
        };
        let term_sets = TermSets::read_file(path)?;
        let reference_tag = &params.reference_model;
        let reference = models
            .get(reference_tag)
            .ok_or_else(|| Error::InvalidModel(format!("reference model '{}' was not built", reference_tag)))?;

        let matcher = StemMatcher { stemming: params.stemming };
        let alignment = align(&term_sets, reference, &matcher);

        let mut tags: Vec<String> = Vec::new();
        let mut vocabs: Vec<Vec<String>> = Vec::new();
        for (tag, records) in &alignment.records {
            if records.is_empty() {
                warn!("no term of '{}' is in the vocabulary of '{}'", tag, reference_tag);
                continue;
            }
            if let Some(name) = Pipeline::restricted_tag(reference_tag, tag, models) {
                tags.push(name);
                vocabs.push(unique_vocab(records));
            }
        }
        report.alignment_failures.extend(alignment.failures);

        // every term set together
        if term_sets.get(&params.combined_tag).is_some() {
            warn!("a term set is tagged '{}', skipping the merged term set table", params.combined_tag);
        } else {
            match term_sets.merged() {
                Ok(merged) => {
                    let records = align_entry(&merged, reference, &matcher).filter(|r| !r.is_empty());
                    let name = Pipeline::restricted_tag(reference_tag, &params.combined_tag, models);
                    if let (Some(records), Some(name)) = (records, name) {
                        tags.push(name);
                        vocabs.push(unique_vocab(&records));
                    }
                },
                Err(e) => {
                    warn!("cannot merge term sets: {}", e);
                    report.alignment_failures.insert(params.combined_tag.to_owned(), e);
                }
            }
        }

        let pairs: Vec<(&str, &WordVectors)> = tags.iter().map(|tag| (tag.as_str(), reference)).collect();
        report.exports.extend(export_models(&params.base_dir, &pairs, Some(&vocabs), &params.matrix)?);
        Ok(())
    }

    // `<reference>_<tag>`, unless a model already owns that name and its full table
    fn restricted_tag(reference_tag: &str, tag: &str, models: &BTreeMap<String, WordVectors>) -> Option<String> {
        let name = format!("{}_{}", reference_tag, tag);
        if models.contains_key(&name) {
            warn!("table '{}' of term set '{}' would replace the full table of model '{}', skipping", name, tag, name);
            return None;
        }
        Some(name)
    }
}
