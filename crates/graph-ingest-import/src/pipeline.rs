use std::{
    path::Path,
    sync::{atomic::AtomicBool, Arc},
    time::Instant,
};

use error_stack::{Result, ResultExt};
use graph_ingest_fusion::{
    DedupConfig, EntityDeduplicator, EntityLinker, LinkerConfig, RelationDeduplicator, RelationValidator,
};
use graph_ingest_store::GraphStore;
use graph_ingest_tabular::{
    AggregationAccumulator, AggregationConfig, DataQualityValidator, DataTable, QualityConfig, QualityReport,
    Row, SchemaMapping,
};
use graph_ingest_types::{Entity, GraphSchema, Provenance, PropertyValue, Relation};
use time::OffsetDateTime;

use crate::{
    error::ConfigurationError,
    optimizer::{BatchSizeOptimizer, MemoryTracker, PerformanceMetrics},
    readers::{
        CsvRowReader, ExcelRowReader, JsonRowReader, RowReader, SheetSelector, SpssRowReader, VALUE_LABELS_KEY,
        VARIABLE_LABELS_KEY,
    },
    result::ImportResult,
};

/// A caller-supplied progress hook, fired after every batch flush with a
/// human-readable message and the row count processed so far — streamed
/// sources don't know their total row count up front, so this reports
/// absolute progress rather than a completion fraction (§4.15). A panic
/// inside the callback is caught and logged, never propagated — a
/// misbehaving callback can never abort an otherwise-successful import.
pub type ImportProgressCallback = Arc<dyn Fn(&str, usize) + Send + Sync>;

/// A cooperative cancellation flag checked at every suspension point named in
/// §5: before a batch starts, and between individual store writes within a
/// batch. Cheap to clone and share across worker tasks.
#[derive(Clone, Default)]
pub struct CancellationSignal(Arc<AtomicBool>);

impl CancellationSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Configures a [`StructuredPipeline`] (§4.15, §4.16).
pub struct StructuredPipelineConfig {
    pub batch_size: usize,
    pub use_bulk_writes: bool,
    pub enable_dedup: bool,
    pub dedup_name_property: String,
    pub enable_linking: bool,
    pub link_name_property: String,
    pub schema: Option<GraphSchema>,
    pub enable_relation_validation: bool,
    pub skip_errors: bool,
    pub quality: Option<QualityConfig>,
    pub aggregations: Vec<AggregationConfig>,
    pub auto_tune_batch_size: bool,
    pub target_memory_pct: f64,
    pub memory_budget_mb: f64,
    pub source_id: String,
}

impl Default for StructuredPipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            use_bulk_writes: true,
            enable_dedup: true,
            dedup_name_property: "name".to_owned(),
            enable_linking: true,
            link_name_property: "name".to_owned(),
            schema: None,
            enable_relation_validation: false,
            skip_errors: false,
            quality: None,
            aggregations: Vec::new(),
            auto_tune_batch_size: false,
            target_memory_pct: 0.25,
            memory_budget_mb: 512.0,
            source_id: "structured-import".to_owned(),
        }
    }
}

/// Orchestrates read → reshape → map → validate → aggregate → persist for
/// tabular sources (§4.15). Shares the fusion layer (C4–C7) with
/// `GraphBuilder`; the one thing this pipeline owns on top is the streamed
/// batching discipline and the performance/memory accounting in §4.16.
pub struct StructuredPipeline {
    store: Arc<dyn GraphStore>,
    config: StructuredPipelineConfig,
    progress: Option<ImportProgressCallback>,
    cancellation: CancellationSignal,
}

impl StructuredPipeline {
    #[must_use]
    pub fn new(store: Arc<dyn GraphStore>, config: StructuredPipelineConfig) -> Self {
        Self {
            store,
            config,
            progress: None,
            cancellation: CancellationSignal::new(),
        }
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: ImportProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, signal: CancellationSignal) -> Self {
        self.cancellation = signal;
        self
    }

    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn import_from_csv(&self, path: &Path, mapping: &SchemaMapping) -> Result<ImportResult, ConfigurationError> {
        let reader = CsvRowReader::open(path)
            .change_context(ConfigurationError)
            .attach_printable_lazy(|| format!("failed to open csv source {}", path.display()))?;
        self.run_import(reader, mapping).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn import_from_json(
        &self,
        path: &Path,
        array_key: Option<&str>,
        mapping: &SchemaMapping,
    ) -> Result<ImportResult, ConfigurationError> {
        let reader = JsonRowReader::open(path, array_key)
            .change_context(ConfigurationError)
            .attach_printable_lazy(|| format!("failed to open json source {}", path.display()))?;
        self.run_import(reader, mapping).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn import_from_excel(
        &self,
        path: &Path,
        sheet: SheetSelector<'_>,
        mapping: &SchemaMapping,
    ) -> Result<ImportResult, ConfigurationError> {
        let reader = ExcelRowReader::open(path, sheet)
            .change_context(ConfigurationError)
            .attach_printable_lazy(|| format!("failed to open excel source {}", path.display()))?;
        self.run_import(reader, mapping).await
    }

    #[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn import_from_spss(&self, path: &Path, mapping: &SchemaMapping) -> Result<ImportResult, ConfigurationError> {
        let reader = SpssRowReader::open(path)
            .change_context(ConfigurationError)
            .attach_printable_lazy(|| format!("failed to open spss source {}", path.display()))?;
        self.run_import(reader, mapping).await
    }

    /// Imports an already-materialised `DataTable` — the batch form is the
    /// streaming form materialised (§9 "Streaming vs. batch duality").
    pub async fn import_from_dataframe(
        &self,
        table: &DataTable,
        mapping: &SchemaMapping,
    ) -> Result<ImportResult, ConfigurationError> {
        self.run_import(TableRowReader::new(table), mapping).await
    }

    /// `melt`s `table` per `reshape` before mapping, then imports the
    /// reshaped long-format table (§4.9, §4.15 "reshape_and_import_csv").
    pub async fn reshape_and_import_csv(
        &self,
        path: &Path,
        id_vars: &[String],
        value_vars: &[String],
        var_name: &str,
        value_name: &str,
        mapping: &SchemaMapping,
    ) -> Result<ImportResult, ConfigurationError> {
        let mut reader = CsvRowReader::open(path)
            .change_context(ConfigurationError)
            .attach_printable_lazy(|| format!("failed to open csv source {}", path.display()))?;

        let mut table = DataTable::new(reader.columns().to_vec());
        while let Some(row) = reader
            .read_row()
            .change_context(ConfigurationError)
            .attach_printable("failed to read csv record for reshape")?
        {
            table.push_row(row);
        }

        let reshaped = graph_ingest_tabular::melt(&table, id_vars, value_vars, var_name, value_name)
            .change_context(ConfigurationError)
            .attach_printable("reshape before import failed")?;

        self.run_import(TableRowReader::new(&reshaped.reshaped), mapping).await
    }

    async fn run_import(
        &self,
        mut reader: impl RowReader,
        mapping: &SchemaMapping,
    ) -> Result<ImportResult, ConfigurationError> {
        mapping
            .validate()
            .change_context(ConfigurationError)
            .attach_printable("schema mapping failed validation")?;

        let started_at = OffsetDateTime::now_utc();
        let start = Instant::now();
        let mut result = ImportResult::default();
        let mut memory = MemoryTracker::start();
        let mut metrics = PerformanceMetrics::start(started_at);
        let mut batch_optimizer = BatchSizeOptimizer::new();
        let mut batch_size = if self.config.auto_tune_batch_size {
            BatchSizeOptimizer::estimate_batch_size(reader.columns().len(), self.config.target_memory_pct)
        } else {
            self.config.batch_size
        };

        // SPSS sources attach variable/value labels (§4.15.1); every other
        // reader's defaults leave both `None` and this is a no-op.
        let spss_variable_labels = reader.variable_labels().cloned();
        let spss_value_labels = spss_variable_labels.as_ref().map(|_| {
            let mut labels = graph_ingest_types::PropertyMap::new();
            for column in reader.columns() {
                if let Some(value_labels) = reader.value_labels_for(column) {
                    labels.insert(column.clone(), value_labels.clone());
                }
            }
            PropertyValue::Dict(labels)
        });

        let header_table = DataTable::new(reader.columns().to_vec());
        let quality_validator = self.config.quality.clone().map(DataQualityValidator::new);
        let mut quality_report = quality_validator.as_ref().map(|_| QualityReport::default());
        let mut completeness_counts: std::collections::BTreeMap<String, (usize, usize)> =
            self.config.quality.as_ref().map_or_else(Default::default, |q| {
                q.required_properties
                    .iter()
                    .map(|column| (column.clone(), (0, 0)))
                    .collect()
            });

        let mut accumulators: Vec<(AggregationConfig, AggregationAccumulator)> = self
            .config
            .aggregations
            .iter()
            .cloned()
            .map(|config| (config, AggregationAccumulator::default()))
            .collect();

        let mut batch_entities: Vec<Entity> = Vec::new();
        let mut batch_relations: Vec<Relation> = Vec::new();
        let mut batch_table = header_table.clone();
        let mut row_index = 0usize;
        let mut batch_row_start = 0usize;

        loop {
            if self.cancellation.is_cancelled() {
                result.success = false;
                result.warnings.push("import cancelled before completion".to_owned());
                break;
            }

            let read_start = Instant::now();
            let next_row = reader
                .read_row()
                .change_context(ConfigurationError)
                .attach_printable("failed to read a row from the tabular source")?;
            metrics.read_seconds += read_start.elapsed().as_secs_f64();

            let Some(row) = next_row else {
                self.flush_batch(
                    &mut result,
                    &mut metrics,
                    &mut batch_optimizer,
                    &mut memory,
                    row_index - batch_row_start,
                    std::mem::take(&mut batch_entities),
                    std::mem::take(&mut batch_relations),
                )
                .await?;
                result.success = true;
                break;
            };

            result.rows_processed += 1;
            for (column, (seen, non_null)) in &mut completeness_counts {
                *seen += 1;
                if header_table.cell(&row, column).is_some_and(|v| !v.is_null()) {
                    *non_null += 1;
                }
            }

            if let (Some(validator), Some(report)) = (&quality_validator, quality_report.as_mut()) {
                batch_table.push_row(row.clone());
                let last = batch_table.rows.len() - 1;
                if let Err(violation) = validator.validate_row(&batch_table, &batch_table.rows[last], row_index, report) {
                    // `validate_row` only returns `Err` when `fail_on_violations`
                    // is set — that is a ValidationError, a distinct failure
                    // kind from the TransformationError `skip_errors` governs
                    // (§7), so it always aborts the import regardless of
                    // `skip_errors`.
                    return Err(violation
                        .change_context(ConfigurationError)
                        .attach_printable("a data-quality rule was violated with fail_on_violations set"));
                }
            }

            for (config, accumulator) in &mut accumulators {
                if let Some(value) = header_table.cell(&row, &config.column).and_then(graph_ingest_types::PropertyValue::as_f64) {
                    accumulator.add(value);
                }
            }

            let transform_start = Instant::now();
            let transformed = mapping.apply_row(&header_table, &row, row_index);
            metrics.transform_seconds += transform_start.elapsed().as_secs_f64();

            match transformed {
                Ok(output) => {
                    let mut entities = output.entities;
                    if let Some(labels) = &spss_variable_labels {
                        for entity in &mut entities {
                            entity.properties.entry(VARIABLE_LABELS_KEY.to_owned()).or_insert_with(|| labels.clone());
                        }
                    }
                    if let Some(labels) = &spss_value_labels {
                        for entity in &mut entities {
                            entity.properties.entry(VALUE_LABELS_KEY.to_owned()).or_insert_with(|| labels.clone());
                        }
                    }
                    batch_entities.extend(entities);
                    batch_relations.extend(output.relations);
                }
                Err(error) => {
                    if self.config.skip_errors {
                        result.rows_failed += 1;
                        result.warnings.push(format!("row {row_index} dropped: {error:?}"));
                    } else {
                        return Err(error
                            .change_context(ConfigurationError)
                            .attach_printable("row transformation failed"));
                    }
                }
            }

            row_index += 1;
            metrics.total_rows += 1;

            if batch_entities.len() + batch_relations.len() >= batch_size || (row_index - batch_row_start) >= batch_size {
                self.flush_batch(
                    &mut result,
                    &mut metrics,
                    &mut batch_optimizer,
                    &mut memory,
                    row_index - batch_row_start,
                    std::mem::take(&mut batch_entities),
                    std::mem::take(&mut batch_relations),
                )
                .await?;
                batch_table.rows.clear();
                batch_row_start = row_index;

                fire_progress(&self.progress, "batch flushed", result.rows_processed);
                if self.config.auto_tune_batch_size {
                    let pressure = memory.under_pressure(self.config.memory_budget_mb);
                    batch_size = batch_optimizer.adjust_batch_size(batch_size, pressure);
                }
            }
        }

        if let Some(report) = &mut quality_report {
            report.rows_processed = result.rows_processed;
            for (column, (seen, non_null)) in &completeness_counts {
                let ratio = if *seen == 0 { 0.0 } else { *non_null as f64 / *seen as f64 };
                report.completeness.insert(column.clone(), ratio);
            }
        }
        result.quality_report = quality_report;

        if !accumulators.is_empty() {
            let mut summary_entities: std::collections::BTreeMap<String, Entity> = std::collections::BTreeMap::new();
            for (config, _) in &accumulators {
                summary_entities
                    .entry(config.entity_type.clone())
                    .or_insert_with(|| graph_ingest_tabular::build_summary_entity(&config.entity_type, &accumulators));
            }
            for entity in summary_entities.into_values() {
                match self.store.add_entity(entity).await {
                    Ok(_) => result.entities_added += 1,
                    Err(report) => result.errors.push(format!("failed to persist aggregation summary: {report:?}")),
                }
            }
        }

        metrics.finish(OffsetDateTime::now_utc());
        metrics.peak_memory_mb = memory.sample();
        result.performance_metrics = Some(metrics);
        result.finish(start.elapsed());
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn flush_batch(
        &self,
        result: &mut ImportResult,
        metrics: &mut PerformanceMetrics,
        batch_optimizer: &mut BatchSizeOptimizer,
        memory: &mut MemoryTracker,
        rows_in_batch: usize,
        mut entities: Vec<Entity>,
        mut relations: Vec<Relation>,
    ) -> Result<(), ConfigurationError> {
        if entities.is_empty() && relations.is_empty() {
            return Ok(());
        }
        let batch_start = Instant::now();
        let provenance = Provenance::new(self.config.source_id.clone(), OffsetDateTime::now_utc());

        if self.config.enable_dedup {
            let dedup = EntityDeduplicator::new(DedupConfig {
                name_property: self.config.dedup_name_property.clone(),
                ..DedupConfig::default()
            });
            let (merged, stats) = dedup.deduplicate(entities);
            entities = merged;
            result.entities_deduplicated += stats.deduplicated();
        }

        let mut linked_updates: Vec<(String, graph_ingest_types::PropertyMap)> = Vec::new();
        if self.config.enable_linking {
            let linker = EntityLinker::new(
                self.store.as_ref(),
                LinkerConfig {
                    name_property: self.config.link_name_property.clone(),
                    ..LinkerConfig::default()
                },
            );
            let link_results = linker
                .link_all(entities)
                .await
                .change_context(ConfigurationError)
                .attach_printable("entity linking failed during batch flush")?;
            let mut new_entities = Vec::new();
            for link_result in link_results {
                if link_result.linked {
                    let existing = link_result.existing.expect("linked implies existing");
                    linked_updates.push((existing.id, link_result.candidate.properties));
                    result.entities_linked += 1;
                } else {
                    new_entities.push(link_result.candidate);
                }
            }
            entities = new_entities;
        }

        if self.config.enable_dedup {
            let before = relations.len();
            relations = RelationDeduplicator::new().deduplicate(relations);
            result.relations_deduplicated += before - relations.len();
        }

        if self.config.enable_relation_validation {
            let entity_type_of: std::collections::HashMap<String, String> =
                entities.iter().map(|e| (e.id.clone(), e.entity_type.clone())).collect();
            let validator = RelationValidator::new(self.config.schema.as_ref());
            let (accepted, rejected) = validator.validate(relations, |id| entity_type_of.get(id).cloned());
            for rejection in rejected {
                result.warnings.push(format!("relation rejected: {}", rejection.reason));
            }
            relations = accepted;
        }

        for entity in &mut entities {
            entity.provenance.push(provenance.clone());
        }
        for relation in &mut relations {
            relation.provenance.push(provenance.clone());
        }

        let write_start = Instant::now();
        if self.config.use_bulk_writes {
            if !linked_updates.is_empty() {
                for (id, properties) in linked_updates {
                    if let Err(report) = self.store.merge_entity_properties(&id, properties).await {
                        result.errors.push(format!("failed to merge properties onto {id}: {report:?}"));
                    }
                }
            }
            if !entities.is_empty() {
                let added = entities.len();
                match self.store.add_entities(entities).await {
                    Ok(_) => result.entities_added += added,
                    Err(report) => result.errors.push(format!("bulk entity write failed: {report:?}")),
                }
            }
            if !relations.is_empty() {
                let added = relations.len();
                match self.store.add_relations(relations).await {
                    Ok(_) => result.relations_added += added,
                    Err(report) => result.errors.push(format!("bulk relation write failed: {report:?}")),
                }
            }
        } else {
            for (id, properties) in linked_updates {
                if let Err(report) = self.store.merge_entity_properties(&id, properties).await {
                    result.errors.push(format!("failed to merge properties onto {id}: {report:?}"));
                }
            }
            for entity in entities {
                match self.store.add_entity(entity).await {
                    Ok(_) => result.entities_added += 1,
                    Err(report) => result.errors.push(format!("failed to persist entity: {report:?}")),
                }
            }
            for relation in relations {
                match self.store.add_relation(relation).await {
                    Ok(_) => result.relations_added += 1,
                    Err(report) => result.errors.push(format!("failed to persist relation: {report:?}")),
                }
            }
        }
        metrics.write_seconds += write_start.elapsed().as_secs_f64();
        metrics.batch_count += 1;
        batch_optimizer.record_batch_time(batch_start.elapsed(), rows_in_batch.max(1));
        metrics.peak_memory_mb = memory.sample();

        Ok(())
    }
}

fn fire_progress(callback: &Option<ImportProgressCallback>, message: &str, rows_processed: usize) {
    let Some(callback) = callback else {
        return;
    };
    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(message, rows_processed))).is_err() {
        tracing::warn!("progress callback panicked; ignoring");
    }
}

/// Adapts an already-materialised `DataTable` to the streaming `RowReader`
/// surface, so `import_from_dataframe` shares the exact same batching loop as
/// every streamed format (§9 "Streaming vs. batch duality").
struct TableRowReader<'a> {
    table: &'a DataTable,
    columns: Vec<String>,
    next: usize,
}

impl<'a> TableRowReader<'a> {
    fn new(table: &'a DataTable) -> Self {
        Self {
            table,
            columns: table.columns.clone(),
            next: 0,
        }
    }
}

impl RowReader for TableRowReader<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn read_row(&mut self) -> Result<Option<Row>, crate::error::ReaderError> {
        let row = self.table.rows.get(self.next).cloned();
        self.next += 1;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use graph_ingest_store::InMemoryGraphStore;
    use graph_ingest_tabular::{EntityMapping, PropertyTransformation};
    use graph_ingest_types::{PropertyValue, ScalarType};

    use super::*;

    fn people_mapping() -> SchemaMapping {
        SchemaMapping {
            entities: vec![EntityMapping {
                entity_type: "Person".to_owned(),
                source_columns: vec!["id".to_owned(), "name".to_owned(), "age".to_owned()],
                property_map: [("name".to_owned(), "name".to_owned())].into_iter().collect(),
                id_column: Some("id".to_owned()),
                transformations: vec![PropertyTransformation::TypeCast {
                    source_column: "age".to_owned(),
                    property: "age".to_owned(),
                    target: ScalarType::Int,
                }],
            }],
            relations: Vec::new(),
        }
    }

    fn write_csv(contents: &str, name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("graph-ingest-import-pipeline-{name}-{}.csv", std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn csv_import_produces_one_entity_per_row() {
        let path = write_csv("id,name,age\n1,Alice,30\n2,Bob,25\n3,Charlie,35\n", "basic");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                enable_linking: false,
                ..StructuredPipelineConfig::default()
            },
        );

        let result = pipeline.import_from_csv(&path, &people_mapping()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.entities_added, 3);
        assert_eq!(result.rows_processed, 3);

        let alice = store.get_entity("1").await.unwrap().unwrap();
        assert_eq!(alice.properties["name"], PropertyValue::from("Alice"));
        assert_eq!(alice.properties["age"], PropertyValue::Int(30));
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn repeated_import_with_dedup_is_idempotent() {
        let path = write_csv("id,name,age\n1,Alice,30\n", "idempotent");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let pipeline = StructuredPipeline::new(Arc::clone(&store), StructuredPipelineConfig::default());

        let first = pipeline.import_from_csv(&path, &people_mapping()).await.unwrap();
        let second = pipeline.import_from_csv(&path, &people_mapping()).await.unwrap();

        assert_eq!(first.entities_added, 1);
        assert_eq!(second.entities_added, 0);
        assert_eq!(second.entities_linked, 1);
        assert_eq!(store.get_stats().await.unwrap().entity_count, 1);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn missing_relation_endpoint_is_recorded_when_skip_errors() {
        let path = write_csv("src,dst\n,b\n", "missing-endpoint");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let mapping = SchemaMapping {
            entities: Vec::new(),
            relations: vec![graph_ingest_tabular::RelationMapping {
                relation_type: "KNOWS".to_owned(),
                source_columns: vec!["src".to_owned(), "dst".to_owned()],
                source_id_column: "src".to_owned(),
                target_id_column: "dst".to_owned(),
                property_map: Default::default(),
                transformations: Vec::new(),
            }],
        };
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                skip_errors: true,
                ..StructuredPipelineConfig::default()
            },
        );
        let result = pipeline.import_from_csv(&path, &mapping).await.unwrap();
        assert!(result.success);
        assert_eq!(result.rows_failed, 1);
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn out_of_range_value_is_recorded_not_aborted() {
        let path = write_csv("id,value\n1,1.5\n", "quality");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let mapping = SchemaMapping {
            entities: vec![EntityMapping {
                entity_type: "Sample".to_owned(),
                source_columns: vec!["id".to_owned(), "value".to_owned()],
                property_map: [("value".to_owned(), "value".to_owned())].into_iter().collect(),
                id_column: Some("id".to_owned()),
                transformations: vec![PropertyTransformation::TypeCast {
                    source_column: "value".to_owned(),
                    property: "value".to_owned(),
                    target: ScalarType::Float,
                }],
            }],
            relations: Vec::new(),
        };
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                enable_linking: false,
                quality: Some(QualityConfig {
                    range_rules: [("value".to_owned(), graph_ingest_tabular::RangeRule { min: 0.0, max: 1.0 })]
                        .into_iter()
                        .collect(),
                    fail_on_violations: false,
                    ..QualityConfig::default()
                }),
                ..StructuredPipelineConfig::default()
            },
        );
        let result = pipeline.import_from_csv(&path, &mapping).await.unwrap();
        assert!(result.success);
        let report = result.quality_report.unwrap();
        assert!(report.range_violations.get("value").copied().unwrap_or(0) >= 1);
        assert!(store.get_entity("1").await.unwrap().is_some());
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn fail_on_violations_aborts_even_when_skip_errors_is_set() {
        let path = write_csv("id,value\n1,1.5\n", "quality-fail-skip");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let mapping = SchemaMapping {
            entities: vec![EntityMapping {
                entity_type: "Sample".to_owned(),
                source_columns: vec!["id".to_owned(), "value".to_owned()],
                property_map: [("value".to_owned(), "value".to_owned())].into_iter().collect(),
                id_column: Some("id".to_owned()),
                transformations: vec![PropertyTransformation::TypeCast {
                    source_column: "value".to_owned(),
                    property: "value".to_owned(),
                    target: ScalarType::Float,
                }],
            }],
            relations: Vec::new(),
        };
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                enable_linking: false,
                skip_errors: true,
                quality: Some(QualityConfig {
                    range_rules: [("value".to_owned(), graph_ingest_tabular::RangeRule { min: 0.0, max: 1.0 })]
                        .into_iter()
                        .collect(),
                    fail_on_violations: true,
                    ..QualityConfig::default()
                }),
                ..StructuredPipelineConfig::default()
            },
        );
        let result = pipeline.import_from_csv(&path, &mapping).await;
        assert!(result.is_err(), "a quality ValidationError must abort regardless of skip_errors");
        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn aggregation_summary_entity_is_written_at_end_of_stream() {
        let mut rows = "id,value\n".to_owned();
        for i in 0..100 {
            rows.push_str(&format!("{i},{}\n", 100.0 + (i % 7) as f64 - 3.0));
        }
        let path = write_csv(&rows, "aggregation");
        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let mapping = SchemaMapping {
            entities: vec![EntityMapping {
                entity_type: "Sample".to_owned(),
                source_columns: vec!["id".to_owned(), "value".to_owned()],
                property_map: [("value".to_owned(), "value".to_owned())].into_iter().collect(),
                id_column: Some("id".to_owned()),
                transformations: vec![PropertyTransformation::TypeCast {
                    source_column: "value".to_owned(),
                    property: "value".to_owned(),
                    target: ScalarType::Float,
                }],
            }],
            relations: Vec::new(),
        };
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                enable_linking: false,
                aggregations: vec![AggregationConfig {
                    entity_type: "Sample".to_owned(),
                    column: "value".to_owned(),
                    function: graph_ingest_tabular::AggregationFunction::Mean,
                    target_property: "mean_value".to_owned(),
                }],
                ..StructuredPipelineConfig::default()
            },
        );
        let result = pipeline.import_from_csv(&path, &mapping).await.unwrap();
        assert!(result.success);
        let summary = store.get_entity("Sample_summary").await.unwrap().unwrap();
        assert!(summary.properties.contains_key("mean_value"));
        std::fs::remove_file(&path).ok();
    }

    /// Stands in for `SpssRowReader` so the label-attachment path in
    /// `run_import` can be exercised without a real `.sav` fixture.
    struct LabeledTableRowReader<'a> {
        inner: TableRowReader<'a>,
        variable_labels: PropertyValue,
        value_labels_by_column: std::collections::BTreeMap<String, PropertyValue>,
    }

    impl RowReader for LabeledTableRowReader<'_> {
        fn columns(&self) -> &[String] {
            self.inner.columns()
        }

        fn read_row(&mut self) -> Result<Option<Row>, crate::error::ReaderError> {
            self.inner.read_row()
        }

        fn variable_labels(&self) -> Option<&PropertyValue> {
            Some(&self.variable_labels)
        }

        fn value_labels_for(&self, column: &str) -> Option<&PropertyValue> {
            self.value_labels_by_column.get(column)
        }
    }

    #[tokio::test]
    async fn spss_style_labels_are_attached_to_every_entity() {
        let mut table = DataTable::new(vec!["id".into(), "gender".into()]);
        table.push_row(vec![PropertyValue::from("1"), PropertyValue::Int(1)]);
        table.push_row(vec![PropertyValue::from("2"), PropertyValue::Int(2)]);

        let reader = LabeledTableRowReader {
            inner: TableRowReader::new(&table),
            variable_labels: PropertyValue::Dict(
                [("gender".to_owned(), PropertyValue::from("Respondent gender"))].into_iter().collect(),
            ),
            value_labels_by_column: [(
                "gender".to_owned(),
                PropertyValue::Dict(
                    [
                        ("1".to_owned(), PropertyValue::from("Male")),
                        ("2".to_owned(), PropertyValue::from("Female")),
                    ]
                    .into_iter()
                    .collect(),
                ),
            )]
            .into_iter()
            .collect(),
        };

        let store: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::default());
        let pipeline = StructuredPipeline::new(
            Arc::clone(&store),
            StructuredPipelineConfig {
                enable_linking: false,
                ..StructuredPipelineConfig::default()
            },
        );
        let mapping = SchemaMapping {
            entities: vec![EntityMapping {
                entity_type: "Respondent".to_owned(),
                source_columns: vec!["id".to_owned(), "gender".to_owned()],
                property_map: [("gender".to_owned(), "gender".to_owned())].into_iter().collect(),
                id_column: Some("id".to_owned()),
                transformations: Vec::new(),
            }],
            relations: Vec::new(),
        };

        let result = pipeline.run_import(reader, &mapping).await.unwrap();
        assert!(result.success);

        let respondent = store.get_entity("1").await.unwrap().unwrap();
        assert_eq!(
            respondent.properties.get(VARIABLE_LABELS_KEY),
            Some(&PropertyValue::Dict(
                [("gender".to_owned(), PropertyValue::from("Respondent gender"))].into_iter().collect()
            ))
        );
        let value_labels = respondent.properties.get(VALUE_LABELS_KEY).expect("value labels attached");
        assert_eq!(
            value_labels,
            &PropertyValue::Dict(
                [(
                    "gender".to_owned(),
                    PropertyValue::Dict(
                        [
                            ("1".to_owned(), PropertyValue::from("Male")),
                            ("2".to_owned(), PropertyValue::from("Female")),
                        ]
                        .into_iter()
                        .collect()
                    )
                )]
                .into_iter()
                .collect()
            )
        );
    }
}
