//! Schema definition and type inference for raw tables.

use crate::data::source::DataBatch;
use serde::{Deserialize, Serialize};

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Boolean,
    Null,
    Unknown,
}

impl ColumnType {
    /// Whether the column can feed a numeric feature channel.
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

/// Schema definition for a raw table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub columns: Vec<ColumnSchema>,
}

impl SchemaDefinition {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Schema for a single column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    pub dtype: ColumnType,
    pub nullable: bool,
}

/// Infer column type from its values. Nulls are ignored; any string makes
/// the whole column a string column.
pub fn infer_column_type<'a>(values: impl IntoIterator<Item = &'a serde_json::Value>) -> ColumnType {
    let mut seen_any = false;
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_string = false;

    for v in values {
        match v {
            serde_json::Value::Null => continue,
            serde_json::Value::Number(n) => {
                if n.is_f64() {
                    has_float = true;
                } else {
                    has_int = true;
                }
            }
            serde_json::Value::Bool(_) => has_bool = true,
            serde_json::Value::String(_) => has_string = true,
            _ => {}
        }
        seen_any = true;
    }

    if !seen_any {
        return ColumnType::Null;
    }
    if has_string {
        return ColumnType::String;
    }
    if has_float {
        return ColumnType::Float;
    }
    if has_int {
        return ColumnType::Integer;
    }
    if has_bool {
        return ColumnType::Boolean;
    }
    ColumnType::Unknown
}

/// Infer schema from a data batch.
pub fn infer_schema(batch: &DataBatch) -> SchemaDefinition {
    let columns = batch
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values = batch.rows.iter().filter_map(|row| row.get(i));
            let nullable = batch
                .rows
                .iter()
                .any(|row| row.get(i).is_none_or(|v| v.is_null()));
            ColumnSchema {
                name: name.clone(),
                dtype: infer_column_type(values),
                nullable,
            }
        })
        .collect();

    SchemaDefinition { columns }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_column_type_int() {
        let values = [json!(1), json!(2), json!(3)];
        assert_eq!(infer_column_type(&values), ColumnType::Integer);
    }

    #[test]
    fn test_infer_column_type_mixed_numeric_is_float() {
        let values = [json!(1), json!(2.5), serde_json::Value::Null];
        assert_eq!(infer_column_type(&values), ColumnType::Float);
        assert!(ColumnType::Float.is_numeric());
    }

    #[test]
    fn test_infer_column_type_string() {
        let values = [json!("a"), json!(2)];
        assert_eq!(infer_column_type(&values), ColumnType::String);
        assert!(!ColumnType::String.is_numeric());
    }

    #[test]
    fn test_all_null_column() {
        let values = [serde_json::Value::Null, serde_json::Value::Null];
        assert_eq!(infer_column_type(&values), ColumnType::Null);
    }

    #[test]
    fn test_infer_schema() {
        let batch = DataBatch::new(
            vec!["gesture".into(), "acc_x".into()],
            vec![
                vec![json!("wave"), json!(0.5)],
                vec![json!("tap"), serde_json::Value::Null],
            ],
        );
        let schema = infer_schema(&batch);
        assert_eq!(schema.columns.len(), 2);
        assert_eq!(schema.columns[0].dtype, ColumnType::String);
        assert!(!schema.columns[0].nullable);
        let acc = schema.column("acc_x").unwrap();
        assert_eq!(acc.dtype, ColumnType::Float);
        assert!(acc.nullable);
    }
}
