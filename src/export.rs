use std::iter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use crate::embedding::EmbeddingModel;
use crate::error::{Error, Result};
use crate::files::write_atomic;
use crate::matrix::{build_matrix, MatrixOptions, SimilarityMatrix};
use crate::store::{check_tag, models_dir};

/// A written similarity table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedTable {
    pub tag: String,
    pub path: PathBuf,
    pub rows: usize,
    pub columns: usize,
}

/// Outcome of a multi-tag export. A failing tag does not undo the others.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<ExportedTable>,
    pub failures: Vec<(String, Error)>,
}

impl ExportReport {

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn extend(&mut self, other: ExportReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
    }
}

/// `<base>/analysis/models/<tag>.tsv`
pub fn tsv_path(base_dir: &Path, tag: &str) -> PathBuf {
    models_dir(base_dir).join(format!("{}.tsv", tag))
}

fn export_error(tag: &str, path: &Path, e: Error) -> Error {
    let source = match e {
        Error::Io(source) => source,
        Error::Csv(source) => source.into(),
        other => return other,
    };
    Error::ExportIo { tag: tag.to_string(), path: path.to_path_buf(), source }
}

/// Writes `matrix` as a tab separated table, replacing any previous export of `tag`.
///
/// The header holds the column terms after an empty corner cell; each row starts
/// with its 1-based position. Unset cells are empty.
pub fn export_matrix(base_dir: &Path, tag: &str, matrix: &SimilarityMatrix) -> Result<ExportedTable> {

    check_tag(tag)?;
    let out = tsv_path(base_dir, tag);

    write_atomic(&out, |f| {
        let mut wrt = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(f);

        wrt.write_record(iter::once("").chain(matrix.columns().iter().map(String::as_str)))?;
        for (i, row) in matrix.cells().outer_iter().enumerate() {
            let cells = row.iter().map(|cell| cell.map(|score| score.to_string()).unwrap_or_default());
            wrt.write_record(iter::once((i + 1).to_string()).chain(cells))?;
        }
        wrt.flush()?;
        Ok(())
    }).map_err(|e| export_error(tag, &out, e))?;

    Ok(ExportedTable {
        tag: tag.to_string(),
        path: out,
        rows: matrix.rows().len(),
        columns: matrix.columns().len(),
    })
}

/// Builds and exports one table per `(tag, model)`.
///
/// `vocabs`, when given, restricts each model to the vocabulary at the same
/// position and must hold exactly one vocabulary per model; otherwise nothing
/// is written. Failures after that check are reported per tag.
pub fn export_models<M: EmbeddingModel + ?Sized>(
    base_dir: &Path,
    models: &[(&str, &M)],
    vocabs: Option<&[Vec<String>]>,
    options: &MatrixOptions,
) -> Result<ExportReport> {

    if let Some(vocabs) = vocabs {
        if vocabs.len() != models.len() {
            return Err(Error::VocabCountMismatch { models: models.len(), vocabularies: vocabs.len() });
        }
    }

    let mut report = ExportReport::default();
    for (i, (tag, model)) in models.iter().enumerate() {

        let vocab = vocabs.map(|v| v[i].as_slice());
        let exported = check_tag(tag)
            .and_then(|_| build_matrix(*model, vocab, options))
            .and_then(|matrix| export_matrix(base_dir, tag, &matrix));

        match exported {
            Ok(table) => {
                info!("exported '{}' ({} x {}) to {}", tag, table.rows, table.columns, table.path.display());
                report.written.push(table);
            },
            Err(e) => {
                warn!("export of '{}' failed: {}", tag, e);
                report.failures.push((tag.to_string(), e));
            }
        }
    }

    Ok(report)
}
