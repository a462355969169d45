use std::collections::BTreeMap;

use error_stack::{Report, Result};
use graph_ingest_types::PropertyValue;

use crate::{error::QualityViolationError, table::{DataTable, Row}};

/// How a numeric outlier is detected (§4.11).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlierMethod {
    ZScore { threshold: f64 },
    Iqr { multiplier: f64 },
}

/// A `[min, max]` bound on a column's numeric values.
#[derive(Debug, Clone, Copy)]
pub struct RangeRule {
    pub min: f64,
    pub max: f64,
}

/// Per-entity-type validation configuration (§4.11).
#[derive(Debug, Clone, Default)]
pub struct QualityConfig {
    pub range_rules: BTreeMap<String, RangeRule>,
    pub outlier_rules: BTreeMap<String, OutlierMethod>,
    pub required_properties: Vec<String>,
    /// Shortcut: apply `zscore > 3` to every numeric column not already
    /// covered by an explicit outlier rule.
    pub detect_outliers: bool,
    pub fail_on_violations: bool,
}

/// Severity of a recorded [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One rule failure observed on one row (§3 `QualityReport`).
#[derive(Debug, Clone)]
pub struct Violation {
    pub row_index: usize,
    pub column: String,
    pub rule: String,
    pub observed: PropertyValue,
    pub severity: Severity,
}

/// Accumulated data-quality findings for one import (§3 `QualityReport`).
#[derive(Debug, Clone, Default)]
pub struct QualityReport {
    pub rows_processed: usize,
    pub violations: Vec<Violation>,
    pub range_violations: BTreeMap<String, usize>,
    pub outlier_counts: BTreeMap<String, usize>,
    pub completeness: BTreeMap<String, f64>,
}

impl QualityReport {
    fn record(&mut self, violation: Violation) {
        match violation.rule.as_str() {
            "range" => *self.range_violations.entry(violation.column.clone()).or_insert(0) += 1,
            "outlier" => *self.outlier_counts.entry(violation.column.clone()).or_insert(0) += 1,
            _ => {}
        }
        self.violations.push(violation);
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} row(s) processed, {} violation(s) across {} column(s)",
            self.rows_processed,
            self.violations.len(),
            self.range_violations.len() + self.outlier_counts.len()
        )
    }
}

/// Evaluates range, outlier, and completeness rules over a table or a stream
/// of rows (§4.11).
#[derive(Debug, Clone, Default)]
pub struct DataQualityValidator {
    config: QualityConfig,
}

impl DataQualityValidator {
    #[must_use]
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Evaluate one row, appending any violations to `report`. When
    /// `fail_on_violations` is set, the first violation aborts with
    /// `QualityViolationError` instead of being recorded.
    pub fn validate_row(
        &self,
        table: &DataTable,
        row: &Row,
        row_index: usize,
        report: &mut QualityReport,
    ) -> Result<(), QualityViolationError> {
        report.rows_processed += 1;

        for column in &self.config.required_properties {
            let missing = table.cell(row, column).map_or(true, PropertyValue::is_null);
            if missing {
                self.raise(
                    report,
                    Violation {
                        row_index,
                        column: column.clone(),
                        rule: "required".to_owned(),
                        observed: PropertyValue::Null,
                        severity: Severity::Error,
                    },
                )?;
            }
        }

        for (column, rule) in &self.config.range_rules {
            if let Some(value) = table.cell(row, column).and_then(PropertyValue::as_f64) {
                if value < rule.min || value > rule.max {
                    self.raise(
                        report,
                        Violation {
                            row_index,
                            column: column.clone(),
                            rule: "range".to_owned(),
                            observed: PropertyValue::Float(value),
                            severity: Severity::Error,
                        },
                    )?;
                }
            }
        }

        for (column, method) in &self.config.outlier_rules {
            if let Some(value) = table.cell(row, column).and_then(PropertyValue::as_f64) {
                if is_outlier(table, column, value, *method) {
                    self.raise(
                        report,
                        Violation {
                            row_index,
                            column: column.clone(),
                            rule: "outlier".to_owned(),
                            observed: PropertyValue::Float(value),
                            severity: Severity::Warning,
                        },
                    )?;
                }
            }
        }

        if self.config.detect_outliers {
            for column in &table.columns {
                if self.config.outlier_rules.contains_key(column) || !table.is_numeric_column(column) {
                    continue;
                }
                if let Some(value) = table.cell(row, column).and_then(PropertyValue::as_f64) {
                    if is_outlier(table, column, value, OutlierMethod::ZScore { threshold: 3.0 }) {
                        self.raise(
                            report,
                            Violation {
                                row_index,
                                column: column.clone(),
                                rule: "outlier".to_owned(),
                                observed: PropertyValue::Float(value),
                                severity: Severity::Warning,
                            },
                        )?;
                    }
                }
            }
        }

        Ok(())
    }

    fn raise(&self, report: &mut QualityReport, violation: Violation) -> Result<(), QualityViolationError> {
        if self.config.fail_on_violations {
            return Err(Report::new(QualityViolationError).attach_printable(format!(
                "row {} column {:?} failed rule {:?}: {:?}",
                violation.row_index, violation.column, violation.rule, violation.observed
            )));
        }
        report.record(violation);
        Ok(())
    }

    /// Completeness ratio (non-null count / total rows) for every configured
    /// required column, computed over the whole table at once.
    pub fn completeness(&self, table: &DataTable, report: &mut QualityReport) {
        let total = table.row_count().max(1) as f64;
        for column in &self.config.required_properties {
            let non_null = table
                .rows
                .iter()
                .filter(|row| {
                    table
                        .cell(row, column)
                        .map(|v| !v.is_null())
                        .unwrap_or(false)
                })
                .count();
            report
                .completeness
                .insert(column.clone(), non_null as f64 / total);
        }
    }
}

fn is_outlier(table: &DataTable, column: &str, value: f64, method: OutlierMethod) -> bool {
    let samples: Vec<f64> = table
        .rows
        .iter()
        .filter_map(|row| table.cell(row, column).and_then(PropertyValue::as_f64))
        .collect();
    if samples.len() < 2 {
        return false;
    }
    match method {
        OutlierMethod::ZScore { threshold } => {
            let mean = samples.iter().sum::<f64>() / samples.len() as f64;
            let variance =
                samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / samples.len() as f64;
            let std_dev = variance.sqrt();
            std_dev > 0.0 && ((value - mean) / std_dev).abs() > threshold
        }
        OutlierMethod::Iqr { multiplier } => {
            let mut sorted = samples.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let q1 = percentile(&sorted, 0.25);
            let q3 = percentile(&sorted, 0.75);
            let iqr = q3 - q1;
            value < q1 - multiplier * iqr || value > q3 + multiplier * iqr
        }
    }
}

fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = fraction * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let weight = position - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_table(values: &[f64]) -> DataTable {
        let mut table = DataTable::new(vec!["value".into()]);
        for v in values {
            table.push_row(vec![PropertyValue::Float(*v)]);
        }
        table
    }

    #[test]
    fn range_rule_is_not_violated_within_bounds() {
        let table = value_table(&[0.5]);
        let validator = DataQualityValidator::new(QualityConfig {
            range_rules: [("value".to_owned(), RangeRule { min: 0.0, max: 1.0 })]
                .into_iter()
                .collect(),
            ..Default::default()
        });
        let mut report = QualityReport::default();
        validator.validate_row(&table, &table.rows[0], 0, &mut report).unwrap();
        assert!(report.range_violations.is_empty());
    }

    #[test]
    fn out_of_range_value_is_recorded_not_aborted_by_default() {
        let table = value_table(&[1.5]);
        let validator = DataQualityValidator::new(QualityConfig {
            range_rules: [("value".to_owned(), RangeRule { min: 0.0, max: 1.0 })]
                .into_iter()
                .collect(),
            ..Default::default()
        });
        let mut report = QualityReport::default();
        validator.validate_row(&table, &table.rows[0], 0, &mut report).unwrap();
        assert_eq!(report.range_violations["value"], 1);
    }

    #[test]
    fn fail_on_violations_aborts_with_error() {
        let table = value_table(&[1.5]);
        let validator = DataQualityValidator::new(QualityConfig {
            range_rules: [("value".to_owned(), RangeRule { min: 0.0, max: 1.0 })]
                .into_iter()
                .collect(),
            fail_on_violations: true,
            ..Default::default()
        });
        let mut report = QualityReport::default();
        let result = validator.validate_row(&table, &table.rows[0], 0, &mut report);
        assert!(result.is_err());
    }

    #[test]
    fn completeness_reflects_null_ratio() {
        let mut table = DataTable::new(vec!["required".into()]);
        table.push_row(vec![PropertyValue::from("x")]);
        table.push_row(vec![PropertyValue::Null]);
        let validator = DataQualityValidator::new(QualityConfig {
            required_properties: vec!["required".to_owned()],
            ..Default::default()
        });
        let mut report = QualityReport::default();
        validator.completeness(&table, &mut report);
        assert_eq!(report.completeness["required"], 0.5);
    }

    #[test]
    fn all_null_required_column_has_zero_completeness() {
        let mut table = DataTable::new(vec!["required".into()]);
        table.push_row(vec![PropertyValue::Null]);
        table.push_row(vec![PropertyValue::Null]);
        let validator = DataQualityValidator::new(QualityConfig {
            required_properties: vec!["required".to_owned()],
            ..Default::default()
        });
        let mut report = QualityReport::default();
        validator.completeness(&table, &mut report);
        assert_eq!(report.completeness["required"], 0.0);
    }

    #[test]
    fn missing_required_property_is_violated_per_row() {
        let table = value_table(&[1.0]);
        let validator = DataQualityValidator::new(QualityConfig {
            required_properties: vec!["missing_column".to_owned()],
            ..Default::default()
        });
        let mut report = QualityReport::default();
        validator.validate_row(&table, &table.rows[0], 0, &mut report).unwrap();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].rule, "required");
        assert_eq!(report.violations[0].column, "missing_column");
    }

    #[test]
    fn all_null_required_column_violates_every_row() {
        let mut table = DataTable::new(vec!["required".into()]);
        table.push_row(vec![PropertyValue::Null]);
        table.push_row(vec![PropertyValue::Null]);
        let validator = DataQualityValidator::new(QualityConfig {
            required_properties: vec!["required".to_owned()],
            ..Default::default()
        });
        let mut report = QualityReport::default();
        for (index, row) in table.rows.iter().enumerate() {
            validator.validate_row(&table, row, index, &mut report).unwrap();
        }
        validator.completeness(&table, &mut report);
        assert_eq!(report.violations.len(), 2);
        assert_eq!(report.completeness["required"], 0.0);
    }

    #[test]
    fn fail_on_violations_aborts_on_missing_required_property() {
        let table = value_table(&[1.0]);
        let validator = DataQualityValidator::new(QualityConfig {
            required_properties: vec!["missing_column".to_owned()],
            fail_on_violations: true,
            ..Default::default()
        });
        let mut report = QualityReport::default();
        let result = validator.validate_row(&table, &table.rows[0], 0, &mut report);
        assert!(result.is_err());
    }
}
