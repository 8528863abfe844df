//! LanceDB backend: one table per index on local disk.
//!
//! Chunk tables follow [`chunk_schema`]. Distances are L2 and converted to
//! `1 / (1 + d)` so higher is better, in line with OpenSearch's L2 scoring.

use arrow_array::{Array, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use precedent_core::traits::VectorIndex;
use precedent_core::types::{ChunkHit, EmbeddingVector, PrecedentMetadata};
use precedent_core::{Error, Result};

pub fn chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("document_id", DataType::Utf8, true),
		Field::new("case_number", DataType::Utf8, true),
		Field::new("case_title", DataType::Utf8, true),
		Field::new("law_category", DataType::Utf8, true),
		Field::new("law_subcategory", DataType::Utf8, true),
		Field::new("court", DataType::Utf8, true),
		Field::new("judgment_date", DataType::Utf8, true),
		Field::new("preview", DataType::Utf8, true),
		Field::new("chunk_content", DataType::Utf8, true),
		Field::new("chunk_sequence", DataType::Int32, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub struct LanceIndex { db: Connection }

fn search_err(e: lancedb::Error) -> Error { Error::Search(e.to_string()) }

impl LanceIndex {
	pub async fn open(db_path: &Path) -> Result<Self> {
		let db = connect(db_path.to_string_lossy().as_ref())
			.execute()
			.await
			.map_err(|e| Error::Connection(format!("cannot open lancedb at {}: {}", db_path.display(), e)))?;
		info!(path = %db_path.display(), "lancedb backend opened");
		Ok(Self { db })
	}

	async fn open_table(&self, name: &str) -> Result<Table> {
		if !self.index_exists(name).await? { return Err(Error::IndexNotFound(name.to_string())); }
		self.db.open_table(name).execute().await.map_err(search_err)
	}
}

#[async_trait]
impl VectorIndex for LanceIndex {
	async fn ping(&self) -> bool {
		self.db.table_names().execute().await.is_ok()
	}

	async fn index_exists(&self, index: &str) -> Result<bool> {
		let names = self.db.table_names().execute().await.map_err(|e| Error::Connection(e.to_string()))?;
		Ok(names.iter().any(|n| n == index))
	}

	async fn knn_search(&self, index: &str, query: &EmbeddingVector, requested_count: usize) -> Result<Vec<ChunkHit>> {
		let table = self.open_table(index).await?;
		let mut stream = table
			.vector_search(query.as_slice().to_vec())
			.map_err(search_err)?
			.distance_type(DistanceType::L2)
			.limit(requested_count)
			.execute()
			.await
			.map_err(search_err)?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(search_err)? {
			let distances = distance_column(&batch)?;
			for i in 0..batch.num_rows() {
				let score = 1.0 / (1.0 + distances.value(i));
				let text = |name: &str| str_at(&batch, name, i).unwrap_or_default();
				hits.push(ChunkHit {
					document_id: str_at(&batch, "document_id", i).filter(|id| !id.trim().is_empty()),
					score,
					text: text("chunk_content"),
					metadata: PrecedentMetadata {
						case_number: text("case_number"),
						case_title: text("case_title"),
						law_category: text("law_category"),
						law_subcategory: text("law_subcategory"),
						court: text("court"),
						judgment_date: text("judgment_date"),
						preview: text("preview"),
					},
				});
			}
		}
		debug!(index, requested_count, returned = hits.len(), "lancedb knn search");
		Ok(hits)
	}

	async fn get_by_id(&self, index: &str, id: &str) -> Result<Option<Value>> {
		let table = self.open_table(index).await?;
		let mut stream = table
			.query()
			.only_if(format!("id = '{}'", id.replace('\'', "''")))
			.limit(1)
			.execute()
			.await
			.map_err(search_err)?;
		while let Some(batch) = stream.try_next().await.map_err(search_err)? {
			if batch.num_rows() == 0 { continue; }
			return Ok(Some(row_to_json(&batch, 0)));
		}
		Ok(None)
	}
}

fn distance_column(batch: &RecordBatch) -> Result<&Float32Array> {
	batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| Error::Search("vector search returned no Float32 `_distance` column".into()))
}

fn str_at(batch: &RecordBatch, name: &str, i: usize) -> Option<String> {
	let col = batch.column_by_name(name)?.as_any().downcast_ref::<StringArray>()?;
	(!col.is_null(i)).then(|| col.value(i).to_string())
}

/// Scalar columns of one row as a JSON object; vectors and other nested columns are left out.
fn row_to_json(batch: &RecordBatch, i: usize) -> Value {
	let mut out = Map::new();
	for (field, col) in batch.schema().fields().iter().zip(batch.columns()) {
		if col.is_null(i) { out.insert(field.name().clone(), Value::Null); continue; }
		let any = col.as_any();
		let value = match field.data_type() {
			DataType::Utf8 => any.downcast_ref::<StringArray>().map(|a| Value::from(a.value(i))),
			DataType::Int32 => any.downcast_ref::<Int32Array>().map(|a| Value::from(a.value(i))),
			DataType::Int64 => any.downcast_ref::<Int64Array>().map(|a| Value::from(a.value(i))),
			DataType::Float32 => any.downcast_ref::<Float32Array>().map(|a| Value::from(f64::from(a.value(i)))),
			DataType::Float64 => any.downcast_ref::<Float64Array>().map(|a| Value::from(a.value(i))),
			_ => None,
		};
		if let Some(v) = value { out.insert(field.name().clone(), v); }
	}
	Value::Object(out)
}
