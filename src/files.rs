use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use ndarray::Array2;
use ndarray_npy::{read_npy, WriteNpyExt};
use tempfile::NamedTempFile;
use crate::error::{Error, Result};
use crate::terms::TermSets;

/// Artifacts that can be loaded from `<dir>/<name>.<EXTENSION>`.
pub trait ReadFile: Sized {
    const EXTENSION: &'static str;
    fn read_file(file_path: &Path) -> Result<Self>;
}

/// Artifacts that can be written to `<dir>/<name>.<EXTENSION>`.
pub trait SaveFile {
    const EXTENSION: &'static str;
    fn save_file(&self, file_path: &Path) -> Result<()>;
}

pub fn artifact_path(dir: &Path, file_name: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}.{}", file_name, extension))
}

pub fn read_input<R: ReadFile>(dir: &Path, file_name: &str) -> Result<R> {
    R::read_file(&artifact_path(dir, file_name, R::EXTENSION))
}

pub fn save_output<S: SaveFile>(output_dir: &Path, file_name: &str, item: &S) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let out = artifact_path(output_dir, file_name, S::EXTENSION);
    item.save_file(&out)?;
    Ok(out)
}

/// Writes through a temporary file in the destination directory and renames it
/// over `path` once `write` succeeded. A failed write leaves `path` untouched.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write(&mut writer)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

impl ReadFile for Array2<f32> {
    const EXTENSION: &'static str = "npy";
    fn read_file(file_path: &Path) -> Result<Self> {
        Ok(read_npy(file_path)?)
    }
}

impl SaveFile for Array2<f32> {
    const EXTENSION: &'static str = "npy";
    fn save_file(&self, file_path: &Path) -> Result<()> {
        write_atomic(file_path, |f| Ok(self.write_npy(f)?))
    }
}

// vocabularies are kept in index order
impl ReadFile for Vec<String> {
    const EXTENSION: &'static str = "json";
    fn read_file(file_path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_path)?);
        Ok(serde_json::from_reader(f)?)
    }
}

impl SaveFile for Vec<String> {
    const EXTENSION: &'static str = "json";
    fn save_file(&self, file_path: &Path) -> Result<()> {
        write_atomic(file_path, |f| Ok(serde_json::to_writer(f, self)?))
    }
}

impl ReadFile for TermSets {
    const EXTENSION: &'static str = "json";
    fn read_file(file_path: &Path) -> Result<Self> {
        let f = BufReader::new(File::open(file_path)?);
        TermSets::from_value(serde_json::from_reader(f)?)
    }
}

/// Saves co-occurrence slices as `cooc<i>.gz`, each a gzip'ed bincode array.
pub fn save_slices(output_dir: &Path, slices: &[Array2<f32>]) -> Result<()> {

    fs::create_dir_all(output_dir)?;
    for (i, slice) in slices.iter().enumerate() {
        let out = artifact_path(output_dir, &format!("cooc{}", i), "gz");
        write_atomic(&out, |f| {
            let mut writer = GzEncoder::new(f, Compression::default());
            bincode::serialize_into(&mut writer, slice)?;
            writer.finish()?;
            Ok(())
        })?;
    }
    Ok(())
}

/// Loads the slices written by [`save_slices`], in slice order.
pub fn read_slices(input_dir: &Path) -> Result<Vec<Array2<f32>>> {

    let mut indexed: Vec<(usize, PathBuf)> = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        let index = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("cooc"))
            .and_then(|n| n.strip_suffix(".gz"))
            .and_then(|n| n.parse::<usize>().ok());
        if let Some(i) = index {
            indexed.push((i, path));
        }
    }
    indexed.sort();

    indexed
        .into_iter()
        .map(|(_, path)| -> Result<Array2<f32>> {
            let reader = GzDecoder::new(BufReader::new(File::open(path)?));
            Ok(bincode::deserialize_from(reader)?)
        })
        .collect()
}


#[cfg(test)]
mod tests {

    use super::*;
    use ndarray::array;

    #[test]
    fn arrays_and_vocabularies_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let w: Array2<f32> = array![[1.0, 2.0], [3.0, 4.0]];
        let vocab = vec!["a".to_string(), "b".to_string()];

        let path = save_output(dir.path(), "model", &w).unwrap();
        assert_eq!(path, dir.path().join("model.npy"));
        save_output(dir.path(), "model.vocab", &vocab).unwrap();

        assert_eq!(read_input::<Array2<f32>>(dir.path(), "model").unwrap(), w);
        assert_eq!(read_input::<Vec<String>>(dir.path(), "model.vocab").unwrap(), vocab);
    }

    #[test]
    fn slices_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        let slices: Vec<Array2<f32>> = (0..12).map(|i| array![[i as f32, 0.0, 1.0]]).collect();
        save_slices(dir.path(), &slices).unwrap();
        assert_eq!(read_slices(dir.path()).unwrap(), slices);
    }

    #[test]
    fn failed_write_keeps_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        fs::write(&path, "old").unwrap();

        let result = write_atomic(&path, |f| {
            f.write_all(b"partial")?;
            Err(Error::Config("interrupted".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        // only the original file is left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
