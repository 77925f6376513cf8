use std::collections::HashMap;
use std::fmt;
use std::io;

use chrono::NaiveDate;

use log::warn;

use crate::ioutil::http_get_text;
use crate::regions::{adjust_region_name, RegionName};
use crate::sheets::{Cell, Table};
use crate::timeseries::Counters;


// How many columns in the wide time series data before the per-date
// columns begin: Province/State, Country/Region, Lat, Long.
static TIMESERIES_FIXED_COLS: usize = 4;
static REGION_COL: usize = 1;

static SERIES_FILES: [(&'static str, &'static str); 3] = [
	("Confirmed", "time_series_19-covid-Confirmed.csv"),
	("Deaths", "time_series_19-covid-Deaths.csv"),
	("Recovered", "time_series_19-covid-Recovered.csv"),
];


/// Per-region snapshot of cumulative confirmed cases at one date.
pub type EpidemicState = HashMap<RegionName, u64>;


#[derive(Debug)]
pub enum FetchError {
	Request(reqwest::Error),
	Csv(csv::Error),
	NoUsableDates,
}

impl fmt::Display for FetchError {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Request(e) => fmt::Display::fmt(e, f),
			Self::Csv(e) => fmt::Display::fmt(e, f),
			Self::NoUsableDates => f.write_str("no parseable date columns in source"),
		}
	}
}

impl From<reqwest::Error> for FetchError {
	fn from(err: reqwest::Error) -> Self {
		Self::Request(err)
	}
}

impl From<csv::Error> for FetchError {
	fn from(err: csv::Error) -> Self {
		Self::Csv(err)
	}
}

impl std::error::Error for FetchError {}


/// Melt one wide-format series into dense per-(region, date) counters.
///
/// Provinces are summed into their country/region, names are folded onto
/// the canonical naming first. Malformed cells and rows are logged and
/// skipped, they never abort the whole fetch.
pub fn parse_series<R: io::Read>(r: R, series: &'_ str) -> Result<Counters<RegionName>, FetchError> {
	let mut r = csv::Reader::from_reader(r);
	let headers = r.headers()?.clone();
	let ncols = headers.len();

	let mut col_dates: Vec<Option<NaiveDate>> = Vec::with_capacity(ncols.saturating_sub(TIMESERIES_FIXED_COLS));
	for h in headers.iter().skip(TIMESERIES_FIXED_COLS) {
		match NaiveDate::parse_from_str(h, "%m/%d/%y") {
			Ok(date) => col_dates.push(Some(date)),
			Err(e) => {
				warn!("{}: unparseable date column {:?} dropped: {}", series, h, e);
				col_dates.push(None);
			},
		}
	}

	let start = match col_dates.iter().flatten().min() {
		Some(v) => *v,
		None => return Err(FetchError::NoUsableDates),
	};
	let last = *col_dates.iter().flatten().max().unwrap();
	let mut counters = Counters::new(start, last + chrono::Duration::days(1));

	let mut col_indices: Vec<Option<usize>> = col_dates.iter().map(|date| {
		date.and_then(|d| counters.date_index(d))
	}).collect();
	// a date carried by more than one column keeps only the last one
	let mut seen = vec![false; counters.len()];
	for index in col_indices.iter_mut().rev() {
		if let Some(i) = *index {
			if seen[i] {
				*index = None;
			} else {
				seen[i] = true;
			}
		}
	}

	for (i, row) in r.records().enumerate() {
		let rec = match row {
			Ok(rec) => rec,
			Err(e) => {
				warn!("{}: dropped unreadable row {}: {}", series, i, e);
				continue;
			},
		};
		if rec.len() != ncols {
			warn!("{}: dropped row {} with {} columns (expected {})", series, i, rec.len(), ncols);
			continue;
		}
		let region: RegionName = adjust_region_name(rec.get(REGION_COL).unwrap_or("")).into();
		if region.is_empty() {
			warn!("{}: dropped row {} without a region name", series, i);
			continue;
		}
		let ts = counters.get_or_create(region.clone());
		for (j, index) in col_indices.iter().enumerate() {
			let index = match index {
				Some(v) => *v,
				None => continue,
			};
			let s = rec.get(TIMESERIES_FIXED_COLS + j).unwrap_or("").trim();
			if s.is_empty() {
				continue;
			}
			match s.parse::<f64>() {
				Ok(v) if v >= 0.0 => ts[index] += v as u64,
				Ok(v) => warn!("{}: dropped negative count {} for {:?} in row {}", series, v, region, i),
				Err(e) => warn!("{}: dropped cell {:?} for {:?} in row {}: {}", series, s, region, i, e),
			}
		}
	}
	Ok(counters)
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRow {
	pub region: RegionName,
	pub date: NaiveDate,
	pub confirmed: u64,
	pub deaths: u64,
	pub recovered: u64,
}


pub struct CaseData {
	pub confirmed: Counters<RegionName>,
	pub deaths: Counters<RegionName>,
	pub recovered: Counters<RegionName>,
}

impl CaseData {
	pub fn fetch(client: &reqwest::blocking::Client, base_url: &str) -> Result<Self, FetchError> {
		let mut series = Vec::with_capacity(SERIES_FILES.len());
		for (name, file) in SERIES_FILES.iter() {
			let url = format!("{}{}", base_url, file);
			let body = http_get_text(client, &url)?;
			series.push(parse_series(body.as_bytes(), name)?);
		}
		let recovered = series.pop().unwrap();
		let deaths = series.pop().unwrap();
		let confirmed = series.pop().unwrap();
		Ok(Self{
			confirmed,
			deaths,
			recovered,
		})
	}

	fn sorted_regions(&self) -> Vec<&RegionName> {
		let mut keys: Vec<_> = self.confirmed.keys().collect();
		keys.sort();
		keys
	}

	/// One row per (region, date) with a nonzero confirmed count.
	pub fn rows(&self) -> Vec<CaseRow> {
		let mut result = Vec::new();
		for region in self.sorted_regions() {
			for (i, date) in self.confirmed.dates().enumerate() {
				let confirmed = self.confirmed.get_value(region, i).unwrap_or(0);
				if confirmed == 0 {
					continue;
				}
				let deaths = self.deaths.date_index(date)
					.and_then(|j| self.deaths.get_value(region, j))
					.unwrap_or(0);
				let recovered = self.recovered.date_index(date)
					.and_then(|j| self.recovered.get_value(region, j))
					.unwrap_or(0);
				result.push(CaseRow{
					region: region.clone(),
					date,
					confirmed,
					deaths,
					recovered,
				});
			}
		}
		result
	}

	pub fn state_at(&self, date: NaiveDate) -> EpidemicState {
		let mut state = EpidemicState::new();
		let index = match self.confirmed.date_index(date) {
			Some(v) => v,
			None => return state,
		};
		for region in self.confirmed.keys() {
			let count = self.confirmed.get_value(region, index).unwrap_or(0);
			if count > 0 {
				state.insert(region.clone(), count);
			}
		}
		state
	}

	pub fn latest_state(&self) -> (NaiveDate, EpidemicState) {
		let last = self.confirmed.len() as i64 - 1;
		let date = self.confirmed.index_date(last).expect("empty case data");
		(date, self.state_at(date))
	}

	fn global(counters: &Counters<RegionName>) -> Vec<u64> {
		let total = counters.rekeyed(|_| Some(()));
		match total.get(&()) {
			Some(v) => v.to_vec(),
			None => vec![0; counters.len()],
		}
	}

	/// Epidemic-wide cumulative confirmed count per date.
	pub fn global_confirmed(&self) -> Vec<u64> {
		Self::global(&self.confirmed)
	}

	pub fn global_deaths(&self) -> Vec<u64> {
		Self::global(&self.deaths)
	}

	pub fn table(&self) -> Table {
		let mut table = Table::new(vec![
			"Country/Region".into(),
			"Date".into(),
			"Confirmed".into(),
			"Deaths".into(),
			"Recovered".into(),
		]);
		for row in self.rows() {
			table.push_row(vec![
				Cell::from(row.region.as_str()),
				Cell::from(row.date),
				Cell::from(row.confirmed),
				Cell::from(row.deaths),
				Cell::from(row.recovered),
			]);
		}
		table
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	static CONFIRMED_CSV: &'static str = "\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/24/20
Hubei,Mainland China,30.97,112.27,444,444,549
,Hong Kong,22.3,114.2,0,2,2
,Italy,43.0,12.0,,,1
";

	static MALFORMED_CSV: &'static str = "\
Province/State,Country/Region,Lat,Long,1/22/20,notadate,1/24/20
,Italy,43.0,12.0,1,7,3
,France,46.2,2.2,oops,1,2
";

	fn d(s: &str) -> NaiveDate {
		s.parse::<NaiveDate>().unwrap()
	}

	#[test]
	fn melt_sums_provinces_into_region() {
		let c = parse_series(CONFIRMED_CSV.as_bytes(), "Confirmed").unwrap();
		// Hubei and Hong Kong both fold into China
		assert_eq!(c.get(&"China".into()).unwrap(), &[444, 446, 551]);
		assert_eq!(c.get(&"Italy".into()).unwrap(), &[0, 0, 1]);
	}

	#[test]
	fn melt_produces_unique_region_date_rows() {
		let c = parse_series(CONFIRMED_CSV.as_bytes(), "Confirmed").unwrap();
		let data = CaseData{
			confirmed: c.clone(),
			deaths: Counters::new(c.start(), c.start()),
			recovered: Counters::new(c.start(), c.start()),
		};
		let rows = data.rows();
		let mut seen = std::collections::HashSet::new();
		for row in rows.iter() {
			assert!(seen.insert((row.region.clone(), row.date)));
		}
		// Italy appears once: the two empty cells carry no row
		assert_eq!(rows.iter().filter(|r| r.region == "Italy").count(), 1);
	}

	#[test]
	fn malformed_cells_and_columns_are_dropped() {
		let c = parse_series(MALFORMED_CSV.as_bytes(), "Confirmed").unwrap();
		// the "notadate" column disappears entirely
		assert_eq!(c.len(), 3);
		assert_eq!(c.get(&"Italy".into()).unwrap(), &[1, 0, 3]);
		// France's unparseable first cell is skipped, the rest survives
		assert_eq!(c.get(&"France".into()).unwrap(), &[0, 0, 2]);
	}

	#[test]
	fn duplicate_date_columns_keep_the_last() {
		let c = parse_series("\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20,1/23/20
,Italy,43.0,12.0,1,5,7
".as_bytes(), "Confirmed").unwrap();
		assert_eq!(c.get(&"Italy".into()).unwrap(), &[1, 7]);
	}

	#[test]
	fn state_at_reports_nonzero_regions() {
		let c = parse_series(CONFIRMED_CSV.as_bytes(), "Confirmed").unwrap();
		let data = CaseData{
			deaths: Counters::new(c.start(), c.start()),
			recovered: Counters::new(c.start(), c.start()),
			confirmed: c,
		};
		let state = data.state_at(d("2020-01-23"));
		assert_eq!(state.get("China").copied(), Some(446));
		assert_eq!(state.get("Italy"), None);
		let (date, latest) = data.latest_state();
		assert_eq!(date, d("2020-01-24"));
		assert_eq!(latest.get("Italy").copied(), Some(1));
	}
}
