
mod align;
mod config;
mod cooccurrence;
mod embedding;
mod error;
mod export;
mod files;
mod matrix;
mod phrase;
mod pipeline;
mod store;
mod terms;
mod train;

pub use align::{align, align_entry, align_names, unique_vocab, Alignment, AlignmentRecord};
pub use config::{Config, Params, TrainParams};
pub use cooccurrence::{Cooccurrences, Counts};
pub use embedding::{EmbeddingModel, WordVectors};
pub use error::{Error, Result};
pub use export::{export_matrix, export_models, tsv_path, ExportReport, ExportedTable};
pub use files::{read_input, save_output, write_atomic, ReadFile, SaveFile};
pub use matrix::{build_matrix, MatrixOptions, SimilarityMatrix, Strategy, UnknownTerms};
pub use phrase::{stem, PhraseMatcher, StemMatcher};
pub use pipeline::{Pipeline, PipelineReport};
pub use store::{check_tag, models_dir, DirModelStore, ModelStore, MODELS_DIR};
pub use terms::{Node, TermSetEntry, TermSets};
pub use train::{Glove, TrainReport};
