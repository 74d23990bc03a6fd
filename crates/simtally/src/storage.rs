//! Persistence of result collections.
//!
//! Three on-disk forms are supported:
//! - `bin`: bincode snapshot of the in-memory collection
//! - `json`: the dictionary form as JSON
//! - `yaml`: the dictionary form as YAML
//!
//! The format follows the file extension unless given explicitly. A file
//! name without an extension is stored as `bin`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simtally_core::{CollectionRecord, ResultCollection, SimulationParameters};

/// Error types for storage operations
#[derive(Debug)]
pub enum StorageError {
    /// I/O error (file not found, permission denied, etc.)
    Io(String),
    /// The file content could not be decoded
    Parse(String),
    /// Serialization error
    Serialize(String),
    /// The file extension maps to no known format
    UnknownFormat(PathBuf),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(msg) => write!(f, "IO error: {}", msg),
            StorageError::Parse(msg) => write!(f, "Parse error: {}", msg),
            StorageError::Serialize(msg) => write!(f, "Serialization error: {}", msg),
            StorageError::UnknownFormat(path) => {
                write!(f, "Cannot infer a storage format for {}", path.display())
            }
        }
    }
}

impl std::error::Error for StorageError {}

/// On-disk representation of a [`ResultCollection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    #[default]
    Binary,
    Json,
    Yaml,
}

impl StorageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Binary => "bin",
            StorageFormat::Json => "json",
            StorageFormat::Yaml => "yaml",
        }
    }

    /// Format implied by the extension of `path`, if any
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "bin" => Some(StorageFormat::Binary),
            "json" => Some(StorageFormat::Json),
            "yaml" | "yml" => Some(StorageFormat::Yaml),
            _ => None,
        }
    }

    /// Encode a collection in this format
    pub fn encode(&self, collection: &ResultCollection) -> Result<Vec<u8>, StorageError> {
        match self {
            StorageFormat::Binary => bincode::serialize(collection)
                .map_err(|e| StorageError::Serialize(format!("bincode: {}", e))),
            StorageFormat::Json => serde_json::to_vec_pretty(&collection.to_record())
                .map_err(|e| StorageError::Serialize(format!("json: {}", e))),
            StorageFormat::Yaml => serde_saphyr::to_string(&collection.to_record())
                .map(String::into_bytes)
                .map_err(|e| StorageError::Serialize(format!("yaml: {}", e))),
        }
    }

    /// Decode a collection stored in this format
    pub fn decode(&self, bytes: &[u8]) -> Result<ResultCollection, StorageError> {
        let record: CollectionRecord<SimulationParameters> = match self {
            StorageFormat::Binary => {
                return bincode::deserialize(bytes)
                    .map_err(|e| StorageError::Parse(format!("bincode: {}", e)));
            }
            StorageFormat::Json => serde_json::from_slice(bytes)
                .map_err(|e| StorageError::Parse(format!("json: {}", e)))?,
            StorageFormat::Yaml => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|e| StorageError::Parse(format!("yaml: {}", e)))?;
                serde_saphyr::from_str(text)
                    .map_err(|e| StorageError::Parse(format!("yaml: {}", e)))?
            }
        };
        ResultCollection::from_record(record).map_err(|e| StorageError::Parse(e.to_string()))
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Resolve the file path and format for `path`.
///
/// An explicit format wins over the extension. A path without an extension
/// gets the extension of the chosen format.
pub fn resolve(
    path: &Path,
    format: Option<StorageFormat>,
) -> Result<(PathBuf, StorageFormat), StorageError> {
    if path.extension().is_none() {
        let format = format.unwrap_or_default();
        return Ok((path.with_extension(format.extension()), format));
    }
    match format.or_else(|| StorageFormat::from_path(path)) {
        Some(format) => Ok((path.to_path_buf(), format)),
        None => Err(StorageError::UnknownFormat(path.to_path_buf())),
    }
}

/// Save a collection under a file name template.
///
/// The format and any default extension come from the template. Its
/// `{param}` placeholders are then replaced with parameter values, and the
/// template itself is recorded as the collection's origin. Returns the path
/// written.
pub fn save(
    collection: &mut ResultCollection,
    template: &Path,
    format: Option<StorageFormat>,
) -> Result<PathBuf, StorageError> {
    let (resolved, format) = resolve(template, format)?;
    collection.origin_filename = Some(template.to_string_lossy().into_owned());

    let path = PathBuf::from(collection.filename_with_params(&resolved.to_string_lossy()));
    let bytes = format.encode(collection)?;

    atomic_write_bytes(&path, &bytes)
        .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
    tracing::debug!(path = %path.display(), %format, bytes = bytes.len(), "saved results");
    Ok(path)
}

/// Load a collection, inferring the format from the extension unless given
pub fn load(path: &Path, format: Option<StorageFormat>) -> Result<ResultCollection, StorageError> {
    let (path, format) = resolve(path, format)?;
    let bytes = fs::read(&path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    let collection = format.decode(&bytes)?;
    tracing::debug!(
        path = %path.display(),
        %format,
        metrics = collection.len(),
        "loaded results"
    );
    Ok(collection)
}

/// Write bytes to a file atomically using write-then-rename pattern.
pub fn atomic_write_bytes(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    fs::write(&temp_path, content)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use simtally_core::{MetricAccumulator, MetricKind};
    use tempfile::tempdir;

    fn sample() -> ResultCollection {
        let params = SimulationParameters::new()
            .with_fixed("bits", 1000)
            .with_unpacked("snr", [0, 5]);
        let mut collection = ResultCollection::with_parameters(params);
        for errors in [40.0, 4.0] {
            let ber =
                MetricAccumulator::create("ber", MetricKind::Ratio, errors, Some(1000.0), false)
                    .unwrap();
            collection.append(ber).unwrap();
        }
        let mut choice = MetricAccumulator::categorical("modulation", 2).unwrap();
        choice.update_choice(1).unwrap();
        collection.add(choice);
        collection.repetition_count = Some(12);
        collection
    }

    #[test]
    fn test_format_from_path() {
        let format = |name: &str| StorageFormat::from_path(Path::new(name));
        assert_eq!(format("a.json"), Some(StorageFormat::Json));
        assert_eq!(format("a.YML"), Some(StorageFormat::Yaml));
        assert_eq!(format("a.bin"), Some(StorageFormat::Binary));
        assert_eq!(format("a.txt"), None);
        assert_eq!(format("a"), None);
    }

    #[test]
    fn test_resolve() {
        let (path, format) = resolve(Path::new("out"), None).unwrap();
        assert_eq!(path, PathBuf::from("out.bin"));
        assert_eq!(format, StorageFormat::Binary);

        let (path, format) = resolve(Path::new("out"), Some(StorageFormat::Yaml)).unwrap();
        assert_eq!(path, PathBuf::from("out.yaml"));
        assert_eq!(format, StorageFormat::Yaml);

        assert!(matches!(
            resolve(Path::new("out.txt"), None),
            Err(StorageError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_round_trip_every_format() {
        let dir = tempdir().unwrap();

        for format in [StorageFormat::Binary, StorageFormat::Json, StorageFormat::Yaml] {
            let mut collection = sample();
            let template = dir.path().join(format!("ber_{{snr}}.{}", format.extension()));
            let path = save(&mut collection, &template, None).unwrap();

            assert_eq!(
                path.file_name().unwrap().to_string_lossy(),
                format!("ber_[0_5].{}", format.extension())
            );
            let loaded = load(&path, None).unwrap();
            assert_eq!(loaded, collection, "{format} round trip");
            assert_eq!(
                loaded.names().collect::<Vec<_>>(),
                vec!["ber", "modulation"]
            );
            assert_eq!(
                loaded.origin_filename.as_deref(),
                Some(template.to_string_lossy().as_ref())
            );

            let mut temp = path.as_os_str().to_owned();
            temp.push(".tmp");
            assert!(!PathBuf::from(temp).exists());
        }
    }

    #[test]
    fn test_save_float_parameters_in_template() {
        let dir = tempdir().unwrap();
        let params = SimulationParameters::new()
            .with_fixed("snr", 0.5)
            .with_unpacked("rate", [0.25, 1.5]);
        let mut collection = ResultCollection::with_parameters(params);
        collection
            .add_new("ber", MetricKind::Ratio, 3.0, Some(100.0))
            .unwrap();

        let path = save(&mut collection, &dir.path().join("ber_{snr}"), None).unwrap();
        assert_eq!(path.file_name().unwrap(), "ber_0.5.bin");
        assert_eq!(load(&path, None).unwrap(), collection);

        let template = dir.path().join("ber_{rate}.json");
        let path = save(&mut collection, &template, None).unwrap();
        assert_eq!(path.file_name().unwrap(), "ber_[0.25_1.5].json");
        assert_eq!(load(&path, None).unwrap(), collection);
    }

    #[test]
    fn test_json_and_yaml_keep_non_finite_values() {
        let dir = tempdir().unwrap();
        for name in ["peak.json", "peak.yaml"] {
            let mut collection = ResultCollection::new();
            collection
                .add_new("peak", MetricKind::LastValue, f64::INFINITY, None)
                .unwrap();
            collection
                .add_new("drift", MetricKind::Additive, f64::NEG_INFINITY, None)
                .unwrap();

            let path = save(&mut collection, &dir.path().join(name), None).unwrap();
            let loaded = load(&path, None).unwrap();
            assert_eq!(loaded, collection, "{name}");
            assert_eq!(
                loaded.last("peak").and_then(|acc| acc.get_result()),
                Some(simtally_core::ResultValue::Scalar(f64::INFINITY))
            );
        }
    }

    #[test]
    fn test_binary_keeps_elapsed() {
        let dir = tempdir().unwrap();
        let mut collection = sample();
        collection.elapsed = Some(std::time::Duration::from_millis(1500));

        let path = save(&mut collection, &dir.path().join("run"), None).unwrap();
        assert_eq!(path.extension().unwrap(), "bin");
        let loaded = load(&dir.path().join("run"), None).unwrap();
        assert_eq!(loaded.elapsed, Some(std::time::Duration::from_millis(1500)));
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            load(&dir.path().join("missing.json"), None),
            Err(StorageError::Io(_))
        ));

        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{not json").unwrap();
        assert!(matches!(load(&garbage, None), Err(StorageError::Parse(_))));
    }

    #[test]
    fn test_atomic_write_bytes_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.bin");

        atomic_write_bytes(&path, b"first").unwrap();
        atomic_write_bytes(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }
}
