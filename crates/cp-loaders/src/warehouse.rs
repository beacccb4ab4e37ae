/*
 *
 *
 *
 *
 * MIT License
 * Copyright (c) 2025. Dwight J. Browne
 * dwight[-at-]dwightjbrowne[-dot-]com
 *
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Analytical warehouse the normalized table is loaded into.
//!
//! [`Warehouse`] is the seam for a managed warehouse connector;
//! [`LocalWarehouse`] lays tables out as
//! `root/project/dataset/table/{schema.json,data.csv}` with a header-less
//! data file that only ever grows under [`WriteDisposition::Append`].

use crate::artifact::write_atomic;
use crate::{LoaderError, LoaderResult};
use async_trait::async_trait;
use cp_models::{SchemaError, TableSchema};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

const SCHEMA_FILE: &str = "schema.json";
const DATA_FILE: &str = "data.csv";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
  pub project: String,
  pub dataset: String,
  pub table: String,
}

impl TableRef {
  pub fn new(
    project: impl Into<String>,
    dataset: impl Into<String>,
    table: impl Into<String>,
  ) -> Self {
    Self { project: project.into(), dataset: dataset.into(), table: table.into() }
  }
}

impl fmt::Display for TableRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{}.{}", self.project, self.dataset, self.table)
  }
}

/// What a load does with rows already in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WriteDisposition {
  /// Add rows after the existing ones
  #[default]
  Append,
  /// Replace the existing rows
  Truncate,
  /// Only load into a table with no rows
  Empty,
}

#[derive(Debug, Clone)]
pub struct LoadRequest {
  pub table: TableRef,
  pub source: PathBuf,
  pub schema: TableSchema,
  pub write_disposition: WriteDisposition,
  /// Leading rows of the source that are not data; the first of them is
  /// checked as the header
  pub skip_leading_rows: usize,
}

impl LoadRequest {
  /// Append a CSV file with one header row
  pub fn append_csv(table: TableRef, source: impl Into<PathBuf>, schema: TableSchema) -> Self {
    Self {
      table,
      source: source.into(),
      schema,
      write_disposition: WriteDisposition::Append,
      skip_leading_rows: 1,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
  pub table: TableRef,
  pub rows_loaded: usize,
  /// Rows in the table once the load completed
  pub total_rows: usize,
}

#[async_trait]
pub trait Warehouse: Send + Sync {
  async fn ensure_dataset(&self, project: &str, dataset: &str) -> LoaderResult<()>;

  /// Create the table with `schema`, or check an existing table has exactly that schema
  async fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> LoaderResult<()>;

  /// Load a CSV file. Either every row is loaded or none is.
  async fn load_csv(&self, request: &LoadRequest) -> LoaderResult<LoadReport>;

  async fn row_count(&self, table: &TableRef) -> LoaderResult<usize>;
}

pub struct LocalWarehouse {
  root: PathBuf,
}

impl LocalWarehouse {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  fn dataset_dir(&self, project: &str, dataset: &str) -> PathBuf {
    self.root.join(project).join(dataset)
  }

  fn table_dir(&self, table: &TableRef) -> PathBuf {
    self.dataset_dir(&table.project, &table.dataset).join(&table.table)
  }

  fn stored_schema(&self, table: &TableRef) -> LoaderResult<Option<TableSchema>> {
    let path = self.table_dir(table).join(SCHEMA_FILE);
    if !path.is_file() {
      return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(|e| LoaderError::io(&path, e))?;
    Ok(Some(serde_json::from_str(&text)?))
  }

  /// All stored rows of a table, in load order
  pub fn rows(&self, table: &TableRef) -> LoaderResult<Vec<Vec<String>>> {
    let path = self.table_dir(table).join(DATA_FILE);
    if !path.is_file() {
      return Ok(Vec::new());
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(&path)?;
    reader
      .records()
      .map(|record| Ok(record?.iter().map(str::to_string).collect()))
      .collect()
  }
}

/// Validate every row of `source` against `schema` before anything is written
fn read_validated(request: &LoadRequest) -> LoaderResult<Vec<csv::StringRecord>> {
  let context = request.source.display().to_string();
  let mut reader = csv::ReaderBuilder::new()
    .has_headers(false)
    .flexible(true)
    .from_path(&request.source)?;

  let mut rows = Vec::new();
  for (index, record) in reader.records().enumerate() {
    let record = record?;
    let fields: Vec<&str> = record.iter().collect();
    if index < request.skip_leading_rows {
      if index == 0 {
        request.schema.validate_header(&fields).map_err(|e| LoaderError::schema(&context, e))?;
      }
      continue;
    }
    request
      .schema
      .validate_row(&fields)
      .map_err(|e| LoaderError::schema(format!("{} row {}", context, index), e))?;
    rows.push(record);
  }
  Ok(rows)
}

fn render_rows(rows: &[csv::StringRecord]) -> LoaderResult<Vec<u8>> {
  let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
  for row in rows {
    writer.write_record(row)?;
  }
  writer.into_inner().map_err(|e| LoaderError::CsvError(e.to_string()))
}

#[async_trait]
impl Warehouse for LocalWarehouse {
  async fn ensure_dataset(&self, project: &str, dataset: &str) -> LoaderResult<()> {
    let dir = self.dataset_dir(project, dataset);
    if dir.is_dir() {
      debug!("Dataset {}.{} already exists", project, dataset);
      return Ok(());
    }
    fs::create_dir_all(&dir).map_err(|e| LoaderError::io(&dir, e))?;
    info!("Created dataset {}.{}", project, dataset);
    Ok(())
  }

  async fn ensure_table(&self, table: &TableRef, schema: &TableSchema) -> LoaderResult<()> {
    let dataset = self.dataset_dir(&table.project, &table.dataset);
    if !dataset.is_dir() {
      return Err(LoaderError::WarehouseError(format!(
        "dataset {}.{} does not exist",
        table.project, table.dataset
      )));
    }

    match self.stored_schema(table)? {
      Some(existing) if &existing == schema => {
        debug!("Table {} already exists", table);
        Ok(())
      }
      Some(existing) => Err(LoaderError::schema(
        table.to_string(),
        SchemaError::TableMismatch { expected: schema.to_string(), found: existing.to_string() },
      )),
      None => {
        let dir = self.table_dir(table);
        write_atomic(&dir.join(SCHEMA_FILE), &serde_json::to_vec_pretty(schema)?)?;
        info!("Created table {} ({} columns)", table, schema.len());
        Ok(())
      }
    }
  }

  #[instrument(skip(self, request), fields(table = %request.table, source = %request.source.display()))]
  async fn load_csv(&self, request: &LoadRequest) -> LoaderResult<LoadReport> {
    match self.stored_schema(&request.table)? {
      Some(existing) if existing == request.schema => {}
      Some(existing) => {
        return Err(LoaderError::schema(
          request.table.to_string(),
          SchemaError::TableMismatch {
            expected: request.schema.to_string(),
            found: existing.to_string(),
          },
        ))
      }
      None => {
        return Err(LoaderError::WarehouseError(format!(
          "table {} does not exist",
          request.table
        )))
      }
    }

    let rows = read_validated(request)?;
    let existing = self.row_count(&request.table).await?;
    let data_path = self.table_dir(&request.table).join(DATA_FILE);
    let bytes = render_rows(&rows)?;

    let total_rows = match request.write_disposition {
      WriteDisposition::Empty if existing > 0 => {
        return Err(LoaderError::WarehouseError(format!(
          "table {} already has {} rows",
          request.table, existing
        )))
      }
      WriteDisposition::Truncate => {
        write_atomic(&data_path, &bytes)?;
        rows.len()
      }
      WriteDisposition::Append | WriteDisposition::Empty => {
        append_bytes(&data_path, &bytes)?;
        existing + rows.len()
      }
    };

    info!("Loaded {} rows into {} ({} total)", rows.len(), request.table, total_rows);
    Ok(LoadReport { table: request.table.clone(), rows_loaded: rows.len(), total_rows })
  }

  async fn row_count(&self, table: &TableRef) -> LoaderResult<usize> {
    Ok(self.rows(table)?.len())
  }
}

fn append_bytes(path: &Path, bytes: &[u8]) -> LoaderResult<()> {
  let mut file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .map_err(|e| LoaderError::io(path, e))?;
  file.write_all(bytes).map_err(|e| LoaderError::io(path, e))?;
  file.sync_all().map_err(|e| LoaderError::io(path, e))
}
