use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// One value of a query result, independent of the backend it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    /// Map a JSON scalar (PostgREST rows) onto a cell; nested values are kept
    /// as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Cell::Int(i),
                None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Null),
            },
            Value::String(s) => Cell::Text(s.clone()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => f.write_str("NULL"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(s) => f.write_str(s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// Tabular result of a read query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by column name, in column order.
    pub fn to_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| {
                        let json = serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
                        (c.clone(), json)
                    })
                    .collect()
            })
            .collect()
    }

    /// Fixed-width text rendering for terminals and LLM prompts.
    pub fn render_table(&self) -> String {
        if self.columns.is_empty() {
            return "No results found.".to_string();
        }
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &cells {
            for (w, c) in widths.iter_mut().zip(row) {
                *w = (*w).max(c.chars().count());
            }
        }

        let line = |values: &[String]| -> String {
            values
                .iter()
                .zip(&widths)
                .map(|(v, w)| format!("{v:<w$}", w = *w))
                .collect::<Vec<_>>()
                .join(" | ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&line(&self.columns));
        out.push('\n');
        out.push_str(
            &widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
        for row in &cells {
            out.push('\n');
            out.push_str(&line(row));
        }
        if cells.is_empty() {
            out.push_str("\n(no rows)");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> QueryResult {
        QueryResult::new(
            vec!["region".into(), "total".into(), "month".into()],
            vec![
                vec![
                    Cell::Text("Mumbai".into()),
                    Cell::Float(2500.5),
                    Cell::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
                ],
                vec![Cell::Text("Delhi".into()), Cell::Int(7), Cell::Null],
            ],
        )
    }

    #[test]
    fn renders_aligned_table() {
        let text = sample().render_table();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "region | total  | month");
        assert_eq!(lines[1], "-------+--------+-----------");
        assert_eq!(lines[2], "Mumbai | 2500.5 | 2024-04-01");
        assert_eq!(lines[3], "Delhi  | 7      | NULL");
    }

    #[test]
    fn empty_result_says_so() {
        assert_eq!(QueryResult::default().render_table(), "No results found.");
        let no_rows = QueryResult::new(vec!["a".into()], vec![]);
        assert!(no_rows.render_table().ends_with("(no rows)"));
    }

    #[test]
    fn serializes_cells_as_plain_json() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["rows"][0], json!(["Mumbai", 2500.5, "2024-04-01"]));
        assert_eq!(v["rows"][1], json!(["Delhi", 7, null]));
        assert_eq!(sample().to_records()[1]["region"], json!("Delhi"));
    }

    #[test]
    fn json_scalars_map_to_cells() {
        assert_eq!(Cell::from_json(&json!(3)), Cell::Int(3));
        assert_eq!(Cell::from_json(&json!(1.5)), Cell::Float(1.5));
        assert_eq!(Cell::from_json(&json!("x")), Cell::Text("x".into()));
        assert!(Cell::from_json(&json!(null)).is_null());
    }
}
