// src/store/parquet_store.rs

use arrow::{compute::concat_batches, record_batch::RecordBatch};
use glob::glob;
use parquet::{
    arrow::{arrow_reader::ParquetRecordBatchReaderBuilder, ArrowWriter},
    basic::Compression,
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::key::{key_to_relative_path, validate_key};
use super::{TableStore, WriteReport};
use crate::error::{Advisory, IngestError, Result};
use crate::schema::arrow::{is_serialized_fallback, INDEX_KEY};
use crate::table::Table;

/// Directory-backed store: key `a/b` lives at `<root>/a/b.parquet`.
#[derive(Debug, Clone)]
pub struct ParquetStore {
    root: PathBuf,
}

impl ParquetStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| IngestError::store(root.display().to_string(), e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute file path of `key`.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(key_to_relative_path(key)?))
    }

    /// Attach the identity columns to the schema metadata.
    fn with_index_metadata(key: &str, table: &Table) -> Result<RecordBatch> {
        let batch = table.batch();
        let mut metadata = batch.schema().metadata().clone();
        metadata.insert(INDEX_KEY.to_string(), table.index().join(","));
        let schema = Arc::new(batch.schema().as_ref().clone().with_metadata(metadata));
        RecordBatch::try_new(schema, batch.columns().to_vec())
            .map_err(|e| IngestError::store(key, e))
    }

    fn write_file(file: &mut NamedTempFile, batch: &RecordBatch) -> Result<()> {
        let label = file.path().display().to_string();
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();

        let mut writer = ArrowWriter::try_new(&mut *file, batch.schema(), Some(props))
            .map_err(|e| IngestError::store(&label, e))?;
        writer.write(batch).map_err(|e| IngestError::store(&label, e))?;
        writer.close().map_err(|e| IngestError::store(&label, e))?;
        file.flush().map_err(|e| IngestError::store(&label, e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| IngestError::store(&label, e))?;
        Ok(())
    }
}

impl TableStore for ParquetStore {
    fn put(&self, key: &str, table: &Table) -> Result<WriteReport> {
        let path = self.path_of(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| IngestError::store(key, "key has no parent directory"))?;
        fs::create_dir_all(parent).map_err(|e| IngestError::store(key, e))?;

        let batch = Self::with_index_metadata(key, table)?;
        let advisories: Vec<Advisory> = batch
            .schema()
            .fields()
            .iter()
            .filter(|f| is_serialized_fallback(f))
            .map(|f| Advisory::PerformanceAdvisory {
                key: key.to_string(),
                column: f.name().clone(),
            })
            .collect();
        for a in &advisories {
            warn!(%key, "{}", a);
        }

        // Temp file in the destination directory so the rename stays on one
        // filesystem. Dropping it on any error below removes it.
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| IngestError::store(key, e))?;
        debug!(%key, tmp = %tmp.path().display(), "writing temporary parquet");
        Self::write_file(&mut tmp, &batch)?;
        tmp.persist(&path)
            .map_err(|e| IngestError::store(key, e.error))?;

        info!(%key, rows = batch.num_rows(), path = %path.display(), "stored table");
        Ok(WriteReport {
            key: key.to_string(),
            rows: batch.num_rows(),
            advisories,
        })
    }

    fn get(&self, key: &str) -> Result<Table> {
        let path = self.path_of(key)?;
        let file = File::open(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IngestError::store(key, "no table stored at this key"),
            _ => IngestError::store(key, e),
        })?;

        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| IngestError::store(key, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| IngestError::store(key, e))?;
        let batches = reader
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| IngestError::store(key, e))?;
        let batch = concat_batches(&schema, &batches).map_err(|e| IngestError::store(key, e))?;

        let index = schema
            .metadata()
            .get(INDEX_KEY)
            .map(|s| {
                s.split(',')
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Table::new(index, batch)
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.path_of(key)?.is_file())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let pattern = format!("{}/**/*.parquet", self.root.display());
        let entries = glob(&pattern).map_err(|e| IngestError::store("<root>", e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| IngestError::store("<root>", e))?;
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let rel = rel.with_extension("");
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if validate_key(&key).is_ok() {
                keys.push(key);
            } else {
                debug!(path = %path.display(), "ignoring file with non-key name");
            }
        }
        keys.sort();
        Ok(keys)
    }
}
