//! Type definitions for schema and data validation.

use serde::Serialize;

/// A column as compared across engines: its name and normalized type bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ColumnSignature {
    pub name: String,
    pub normalized_type: String,
}

impl ColumnSignature {
    pub fn new(name: impl Into<String>, normalized_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            normalized_type: normalized_type.into(),
        }
    }
}

impl std::fmt::Display for ColumnSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.normalized_type)
    }
}

/// Column-level schema comparison of one table present on both sides.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableSchemaDiff {
    pub table: String,
    /// Signatures present on both sides.
    pub matched: Vec<ColumnSignature>,
    /// Source signatures with no equal signature on the target.
    pub missing_in_target: Vec<ColumnSignature>,
    /// Target signatures with no equal signature on the source.
    pub missing_in_source: Vec<ColumnSignature>,
}

impl TableSchemaDiff {
    pub fn is_match(&self) -> bool {
        self.missing_in_target.is_empty() && self.missing_in_source.is_empty()
    }
}

/// A pair of rows that differ at the same sorted position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiff {
    /// Position in the sorted row sequence.
    pub position: usize,
    /// Names of the columns whose values differ.
    pub columns: Vec<String>,
    pub source: Vec<Option<String>>,
    pub target: Vec<Option<String>>,
}

/// Data comparison outcome for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DataOutcome {
    /// Same count and identical rows.
    Match { rows: u64 },
    /// Counts differ; rows were not compared.
    RowCountMismatch { source: i64, target: i64 },
    /// Counts match but some rows differ.
    RowsDiffer {
        rows: u64,
        differing: u64,
        samples: Vec<RowDiff>,
    },
    /// The table has no column in common with the target.
    Skipped { reason: String },
    /// Reading either side failed.
    Failed { error: String },
}

impl DataOutcome {
    pub fn is_match(&self) -> bool {
        matches!(self, DataOutcome::Match { .. })
    }
}

impl std::fmt::Display for DataOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataOutcome::Match { rows } => write!(f, "match ({} rows)", rows),
            DataOutcome::RowCountMismatch { source, target } => {
                write!(f, "row count mismatch (source {}, target {})", source, target)
            }
            DataOutcome::RowsDiffer {
                rows, differing, ..
            } => write!(f, "{} of {} rows differ", differing, rows),
            DataOutcome::Skipped { reason } => write!(f, "skipped ({})", reason),
            DataOutcome::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

/// Validation result for one table present on both sides.
#[derive(Debug, Clone, Serialize)]
pub struct TableValidation {
    pub table: String,
    pub schema: TableSchemaDiff,
    /// `None` when data comparison is disabled or the run stopped early.
    pub data: Option<DataOutcome>,
}

impl TableValidation {
    pub fn is_match(&self) -> bool {
        self.schema.is_match() && self.data.as_ref().map_or(true, DataOutcome::is_match)
    }
}

/// Structured result of a validation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Tables present on both sides.
    pub matched_tables: Vec<String>,
    /// Source tables absent from the target.
    pub missing_in_target: Vec<String>,
    /// Target tables absent from the source.
    pub missing_in_source: Vec<String>,
    pub tables: Vec<TableValidation>,
    /// Set when `fail_fast` stopped the run at the first mismatching table.
    pub stopped_early: bool,
}

impl ValidationReport {
    /// True when both schemas and all compared data agree.
    pub fn is_valid(&self) -> bool {
        self.missing_in_target.is_empty()
            && self.missing_in_source.is_empty()
            && !self.stopped_early
            && self.tables.iter().all(TableValidation::is_match)
    }

    /// Tables whose columns or data differ.
    pub fn mismatched_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|t| !t.is_match())
            .map(|t| t.table.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_validity() {
        let mut report = ValidationReport {
            matched_tables: vec!["users".to_string()],
            tables: vec![TableValidation {
                table: "users".to_string(),
                schema: TableSchemaDiff::default(),
                data: Some(DataOutcome::Match { rows: 3 }),
            }],
            ..Default::default()
        };
        assert!(report.is_valid());

        report.tables[0].data = Some(DataOutcome::RowCountMismatch {
            source: 10,
            target: 8,
        });
        assert!(!report.is_valid());
        assert_eq!(report.mismatched_tables(), vec!["users"]);
    }

    #[test]
    fn test_data_outcome_serializes_with_status_tag() {
        let json = serde_json::to_value(DataOutcome::RowCountMismatch {
            source: 10,
            target: 8,
        })
        .unwrap();
        assert_eq!(json["status"], "row_count_mismatch");
        assert_eq!(json["source"], 10);
        assert_eq!(json["target"], 8);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(
            DataOutcome::RowCountMismatch {
                source: 10,
                target: 8
            }
            .to_string(),
            "row count mismatch (source 10, target 8)"
        );
    }
}
