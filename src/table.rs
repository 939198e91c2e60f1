//! Name / value / unit parameter tables used for protocol summaries.

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamRow {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl ParamRow {
    pub fn new(name: &str, value: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamTable {
    pub rows: Vec<ParamRow>,
}

impl ParamTable {
    pub fn new(rows: Vec<ParamRow>) -> Self {
        Self { rows }
    }

    pub fn extend(&mut self, other: ParamTable) {
        self.rows.extend(other.rows);
    }

    pub fn get(&self, name: &str) -> Option<&ParamRow> {
        self.rows.iter().find(|row| row.name == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl fmt::Display for ParamTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_w = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max("Name".len());
        writeln!(f, "{:<name_w$}  {:>14}  Unit", "Name", "Value")?;
        for row in &self.rows {
            writeln!(f, "{:<name_w$}  {:>14}  {}", row.name, row.value, row.unit)?;
        }
        Ok(())
    }
}
