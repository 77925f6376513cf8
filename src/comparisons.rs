use std::io;

use chrono::NaiveDate;

use log::warn;

use serde::Deserialize;

use smartstring::alias::{String as SmartString};

use crate::hopkins::CaseData;
use crate::sheets::{Cell, Table};
use crate::timeseries::Counters;


pub static CURRENT_EPIDEMIC: &'static str = "Corona Virus 2019-nCoV";
pub static CURRENT_EPIDEMIC_SHORT: &'static str = "Corona";

// Literature values carried into the summaries, same as the dashboard
// has always shown them.
static CURRENT_R0: f64 = 2.74;
static CURRENT_R0_MIN: f64 = 1.4;
static CURRENT_R0_MAX: f64 = 3.9;
static CURRENT_YEARS: &'static str = "2019-";


#[derive(Debug, Clone, Deserialize)]
pub struct HistoricRecord {
	#[serde(rename = "Epidemic")]
	pub epidemic: String,
	#[serde(rename = "Date")]
	pub date: NaiveDate,
	#[serde(rename = "Confirmed")]
	pub confirmed: u64,
	#[serde(rename = "Deaths")]
	pub deaths: u64,
}


/// Stored series of prior epidemics, cumulative per date, keyed by
/// epidemic name.
pub struct HistoricData {
	pub confirmed: Counters<SmartString>,
	pub deaths: Counters<SmartString>,
}

pub fn load_historic<R: io::Read>(r: R) -> io::Result<HistoricData> {
	let mut records: Vec<HistoricRecord> = Vec::new();
	let mut r = csv::Reader::from_reader(r);
	for (i, row) in r.deserialize().enumerate() {
		match row {
			Ok(rec) => records.push(rec),
			Err(e) => warn!("dropped malformed historic row {}: {}", i, e),
		}
	}

	let (start, last) = match (records.iter().map(|r| r.date).min(), records.iter().map(|r| r.date).max()) {
		(Some(lo), Some(hi)) => (lo, hi + chrono::Duration::days(1)),
		_ => {
			let epoch = NaiveDate::from_ymd(1970, 1, 1);
			(epoch, epoch)
		},
	};
	let mut confirmed = Counters::new(start, last);
	let mut deaths = Counters::new(start, last);
	for rec in records.iter() {
		let index = confirmed.date_index(rec.date).unwrap();
		let name: SmartString = rec.epidemic.as_str().into();
		confirmed.get_or_create(name.clone())[index] = rec.confirmed;
		deaths.get_or_create(name)[index] = rec.deaths;
	}
	// the stored series are cumulative; carry values over date gaps
	for counters in [&mut confirmed, &mut deaths].iter_mut() {
		let keys: Vec<SmartString> = counters.keys().cloned().collect();
		for k in keys {
			let ts = counters.get_or_create(k);
			let mut prev = 0;
			for v in ts.iter_mut() {
				if *v == 0 {
					*v = prev;
				} else {
					prev = *v;
				}
			}
		}
	}
	Ok(HistoricData{
		confirmed,
		deaths,
	})
}


#[derive(Debug, Clone, PartialEq)]
pub struct EpidemicOverlay {
	pub name: SmartString,
	pub confirmed: Vec<u64>,
	pub deaths: Vec<u64>,
}

/// Epidemic series re-keyed by day offset from outbreak onset.
///
/// Onset is the first date the epidemic-wide cumulative confirmed count
/// reaches the threshold; that date gets offset zero and earlier dates
/// are dropped. Epidemics which never reach the threshold do not appear.
#[derive(Debug, Clone)]
pub struct ComparisonSeries {
	onset_threshold: u64,
	epidemics: Vec<EpidemicOverlay>,
}

impl ComparisonSeries {
	pub fn new(onset_threshold: u64) -> Self {
		Self{
			onset_threshold,
			epidemics: Vec::new(),
		}
	}

	pub fn onset_threshold(&self) -> u64 {
		self.onset_threshold
	}

	pub fn epidemics(&self) -> &[EpidemicOverlay] {
		&self.epidemics
	}

	pub fn push(&mut self, name: SmartString, confirmed: &[u64], deaths: &[u64]) {
		let onset = match confirmed.iter().position(|v| *v >= self.onset_threshold) {
			Some(v) => v,
			None => {
				warn!("epidemic {:?} never reaches onset threshold {}, omitted", name, self.onset_threshold);
				return;
			},
		};
		let aligned_len = confirmed.len() - onset;
		let deaths = (0..aligned_len).map(|i| {
			deaths.get(onset + i).copied().unwrap_or(0)
		}).collect();
		self.epidemics.push(EpidemicOverlay{
			name,
			confirmed: confirmed[onset..].to_vec(),
			deaths,
		});
	}

	pub fn extend_from_historic(&mut self, data: &HistoricData) {
		let mut names: Vec<&SmartString> = data.confirmed.keys().collect();
		names.sort();
		for name in names {
			// find_ge on the dense series gives the onset index directly
			if data.confirmed.find_ge(name, 0, self.onset_threshold).is_none() {
				warn!("epidemic {:?} never reaches onset threshold {}, omitted", name, self.onset_threshold);
				continue;
			}
			let confirmed = data.confirmed.get(name).unwrap();
			let deaths = data.deaths.get(name).map(|v| v.to_vec()).unwrap_or_default();
			self.push(name.clone(), confirmed, &deaths);
		}
	}

	pub fn table(&self) -> Table {
		let mut table = Table::new(vec![
			"Epidemic".into(),
			"Day".into(),
			"Confirmed".into(),
			"Deaths".into(),
		]);
		for overlay in self.epidemics.iter() {
			for (day, confirmed) in overlay.confirmed.iter().enumerate() {
				table.push_row(vec![
					Cell::from(overlay.name.as_str()),
					Cell::from(day as u64),
					Cell::from(*confirmed),
					Cell::from(overlay.deaths.get(day).copied().unwrap_or(0)),
				]);
			}
		}
		table
	}
}


fn parse_decimal(s: &str) -> Option<f64> {
	// the metadata sheet writes decimals with a comma
	s.trim().replace(',', ".").parse::<f64>().ok()
}

fn decimal_cell(s: Option<&String>) -> Cell {
	match s.and_then(|s| parse_decimal(s)) {
		Some(v) => Cell::Float(v),
		None => Cell::Empty,
	}
}

fn int_cell(s: Option<&String>) -> Cell {
	match s.and_then(|s| parse_decimal(s)) {
		Some(v) => Cell::Int(v as i64),
		None => Cell::Empty,
	}
}

fn text_cell(s: Option<&String>) -> Cell {
	match s {
		Some(s) if !s.is_empty() => Cell::from(s.as_str()),
		_ => Cell::Empty,
	}
}

/// Per-date summary of the current epidemic concatenated with the
/// metadata of prior epidemics read back from the spreadsheet.
///
/// `base_rows` is the raw contents of the metadata worksheet, header row
/// first.
pub fn epidemic_summaries(cases: &CaseData, base_rows: &[Vec<String>]) -> Table {
	let mut table = Table::new(vec![
		"Epidemic".into(),
		"Name".into(),
		"Date".into(),
		"Confirmed".into(),
		"Deaths".into(),
		"CFR".into(),
		"R0".into(),
		"R0min".into(),
		"R0max".into(),
		"Years".into(),
	]);

	if let Some((header, rows)) = base_rows.split_first() {
		let col = |name: &str| header.iter().position(|h| h.as_str() == name);
		let cols = [
			col("Epidemic"), col("Name"), col("Date"), col("Confirmed"),
			col("Deaths"), col("CFR"), col("R0"), col("R0min"), col("R0max"),
			col("Years"),
		];
		for row in rows {
			let field = |i: usize| cols[i].and_then(|c| row.get(c));
			table.push_row(vec![
				text_cell(field(0)),
				text_cell(field(1)),
				text_cell(field(2)),
				int_cell(field(3)),
				int_cell(field(4)),
				decimal_cell(field(5)),
				decimal_cell(field(6)),
				decimal_cell(field(7)),
				decimal_cell(field(8)),
				text_cell(field(9)),
			]);
		}
	}

	let confirmed = cases.global_confirmed();
	let deaths_series = cases.confirmed.dates().map(|date| {
		cases.deaths.date_index(date)
	}).collect::<Vec<_>>();
	let global_deaths = cases.global_deaths();
	for (i, date) in cases.confirmed.dates().enumerate() {
		let c = confirmed[i];
		if c == 0 {
			continue;
		}
		let d = deaths_series[i].map(|j| global_deaths[j]).unwrap_or(0);
		let cfr = d as f64 / c as f64;
		table.push_row(vec![
			Cell::from(CURRENT_EPIDEMIC),
			Cell::from(CURRENT_EPIDEMIC_SHORT),
			Cell::from(date),
			Cell::from(c),
			Cell::from(d),
			Cell::Float(cfr),
			Cell::Float(CURRENT_R0),
			Cell::Float(CURRENT_R0_MIN),
			Cell::Float(CURRENT_R0_MAX),
			Cell::from(CURRENT_YEARS),
		]);
	}
	table
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::hopkins::parse_series;

	#[test]
	fn onset_assigns_offset_zero_at_threshold_date() {
		// rows (RegionA, 2020-01-01, 1), (RegionA, 2020-01-05, 50),
		// threshold 10: offset 0 goes to 2020-01-05, the first is dropped
		let mut series = ComparisonSeries::new(10);
		series.push("RegionA".into(), &[1, 1, 1, 1, 50], &[0, 0, 0, 0, 2]);
		let overlay = &series.epidemics()[0];
		assert_eq!(overlay.confirmed, vec![50]);
		assert_eq!(overlay.deaths, vec![2]);
	}

	#[test]
	fn below_threshold_epidemics_are_omitted() {
		let mut series = ComparisonSeries::new(10);
		series.push("tiny".into(), &[1, 2, 3], &[0, 0, 0]);
		assert!(series.epidemics().is_empty());
	}

	#[test]
	fn aligned_series_is_non_decreasing() {
		let mut series = ComparisonSeries::new(5);
		series.push("a".into(), &[1, 5, 9, 9, 20], &[0, 0, 1, 1, 2]);
		for overlay in series.epidemics() {
			for w in overlay.confirmed.windows(2) {
				assert!(w[1] >= w[0]);
			}
		}
	}

	#[test]
	fn shorter_epidemics_contribute_partial_series() {
		let mut series = ComparisonSeries::new(5);
		series.push("long".into(), &[5, 6, 7, 8, 9, 10], &[0; 6]);
		series.push("short".into(), &[1, 5, 6], &[0; 3]);
		assert_eq!(series.epidemics()[0].confirmed.len(), 6);
		assert_eq!(series.epidemics()[1].confirmed.len(), 2);
		// six rows plus two rows, nothing fails on the missing offsets
		assert_eq!(series.table().rows().len(), 8);
	}

	#[test]
	fn historic_load_skips_malformed_rows_and_fills_gaps() {
		let csv = "\
Epidemic,Date,Confirmed,Deaths
SARS,2003-03-01,100,4
SARS,notadate,150,5
SARS,2003-03-04,200,9
";
		let data = load_historic(csv.as_bytes()).unwrap();
		let ts = data.confirmed.get(&"SARS".into()).unwrap();
		// the gap days carry the previous cumulative value
		assert_eq!(ts, &[100, 100, 100, 200]);
		let mut series = ComparisonSeries::new(10);
		series.extend_from_historic(&data);
		assert_eq!(series.epidemics().len(), 1);
		assert_eq!(series.epidemics()[0].confirmed[0], 100);
	}

	#[test]
	fn summaries_concatenate_base_sheet_and_current_epidemic() {
		let c = parse_series("\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20
,Italy,43.0,12.0,0,4
,China,30.0,112.0,2,4
".as_bytes(), "Confirmed").unwrap();
		let d = parse_series("\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20
,China,30.0,112.0,0,2
".as_bytes(), "Deaths").unwrap();
		let cases = CaseData{
			confirmed: c,
			deaths: d,
			recovered: crate::timeseries::Counters::new(
				NaiveDate::from_ymd(2020, 1, 22), NaiveDate::from_ymd(2020, 1, 22)),
		};
		let base = vec![
			vec!["Epidemic".to_string(), "CFR".to_string(), "R0".to_string()],
			vec!["SARS 2002/2003".to_string(), "0,11".to_string(), "3,5".to_string()],
		];
		let table = epidemic_summaries(&cases, &base);
		// one metadata row plus one row per date with cases
		assert_eq!(table.rows().len(), 3);
		assert_eq!(table.rows()[0][5], Cell::Float(0.11));
		assert_eq!(table.rows()[2][3], Cell::Int(8));
		assert_eq!(table.rows()[2][5], Cell::Float(0.25));
	}
}
