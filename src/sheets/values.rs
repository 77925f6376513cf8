use serde::{Serialize, Serializer};

use smartstring::alias::{String as SmartString};

use chrono::NaiveDate;


/// A single spreadsheet cell value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
	Empty,
	Text(String),
	Int(i64),
	Float(f64),
}

impl Serialize for Cell {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		match self {
			Self::Empty => serializer.serialize_str(""),
			Self::Text(s) => serializer.serialize_str(s),
			Self::Int(v) => serializer.serialize_i64(*v),
			Self::Float(v) => serializer.serialize_f64(*v),
		}
	}
}

impl From<&str> for Cell {
	fn from(other: &str) -> Self {
		Self::Text(other.into())
	}
}

impl From<String> for Cell {
	fn from(other: String) -> Self {
		Self::Text(other)
	}
}

impl From<u64> for Cell {
	fn from(other: u64) -> Self {
		// case counts comfortably fit
		Self::Int(other as i64)
	}
}

impl From<i64> for Cell {
	fn from(other: i64) -> Self {
		Self::Int(other)
	}
}

impl From<f64> for Cell {
	fn from(other: f64) -> Self {
		Self::Float(other)
	}
}

impl From<NaiveDate> for Cell {
	fn from(other: NaiveDate) -> Self {
		Self::Text(other.to_string())
	}
}


/// Header plus rows, the unit everything publishable is shaped into.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
	columns: Vec<SmartString>,
	rows: Vec<Vec<Cell>>,
}

impl Table {
	pub fn new(columns: Vec<SmartString>) -> Self {
		Self{
			columns,
			rows: Vec::new(),
		}
	}

	pub fn push_row(&mut self, row: Vec<Cell>) {
		assert_eq!(row.len(), self.columns.len());
		self.rows.push(row);
	}

	pub fn columns(&self) -> &[SmartString] {
		&self.columns
	}

	pub fn rows(&self) -> &[Vec<Cell>] {
		&self.rows
	}

	pub fn value_range(&self, range: &str) -> ValueRange {
		let mut values = Vec::with_capacity(self.rows.len() + 1);
		values.push(self.columns.iter().map(|c| Cell::Text(c.to_string())).collect());
		values.extend(self.rows.iter().cloned());
		ValueRange{
			range: range.to_string(),
			major_dimension: "ROWS",
			values,
		}
	}
}


#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueRange {
	pub range: String,
	#[serde(rename = "majorDimension")]
	pub major_dimension: &'static str,
	pub values: Vec<Vec<Cell>>,
}
