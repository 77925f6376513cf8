use std::collections::{HashMap, HashSet};
use std::fmt;

use base64;

use chrono::{Datelike, NaiveDate};

use log::warn;

use serde::{Serialize, Deserialize};

use crate::hopkins::EpidemicState;
use crate::ioutil::http_get_text;
use crate::progress::{ProgressMeter, ProgressSink};
use crate::regions::RegionName;
use crate::sheets::{Cell, Table};


pub type LocationId = u32;

static MONTHS: [&'static str; 12] = [
	"Jan", "Feb", "Mar", "Apr", "May", "Jun",
	"Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];


#[derive(Debug)]
pub enum Error {
	Request(reqwest::Error),
	Decode(serde_json::Error),
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Request(e) => fmt::Display::fmt(e, f),
			Self::Decode(e) => fmt::Display::fmt(e, f),
		}
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Self::Request(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		Self::Decode(err)
	}
}

impl std::error::Error for Error {}


#[derive(Debug, Clone, Deserialize)]
pub struct Location {
	pub id: LocationId,
	pub label: String,
	pub lat: f64,
	pub lng: f64,
	pub population: u64,
}


#[derive(Debug, Clone, Deserialize)]
pub struct InitData {
	pub basins: Vec<Location>,
	pub countries: Vec<Location>,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoLevel {
	Country,
	Basin,
}

impl GeoLevel {
	pub fn value(&self) -> &'static str {
		match self {
			Self::Country => "country",
			Self::Basin => "basin",
		}
	}
}


/// The service's own location naming, fetched from its init-data endpoint.
#[derive(Debug, Clone)]
pub struct Nomenclature {
	geolevel: GeoLevel,
	by_label: HashMap<RegionName, LocationId>,
	by_id: HashMap<LocationId, Location>,
}

impl Nomenclature {
	pub fn new(init: InitData, geolevel: GeoLevel) -> Self {
		let locations = match geolevel {
			GeoLevel::Country => init.countries,
			GeoLevel::Basin => init.basins,
		};
		let mut by_label = HashMap::with_capacity(locations.len());
		let mut by_id = HashMap::with_capacity(locations.len());
		for loc in locations {
			by_label.insert(loc.label.as_str().into(), loc.id);
			by_id.insert(loc.id, loc);
		}
		Self{
			geolevel,
			by_label,
			by_id,
		}
	}

	pub fn geolevel(&self) -> GeoLevel {
		self.geolevel
	}

	pub fn id(&self, label: &'_ str) -> Option<LocationId> {
		self.by_label.get(label).copied()
	}

	pub fn label(&self, id: LocationId) -> Option<&str> {
		self.by_id.get(&id).map(|loc| loc.label.as_str())
	}

	/// Translate an epidemic state into a query payload.
	///
	/// Regions the service does not know are logged and omitted, they must
	/// not sink a whole query.
	pub fn state_query(&self, date: NaiveDate, state: &EpidemicState, period: u32, travel_level: f64) -> Query {
		let mut cases: HashMap<LocationId, u64> = HashMap::new();
		for (region, count) in state.iter() {
			match self.id(region) {
				Some(id) => {
					*cases.entry(id).or_insert(0) += *count;
				},
				None => warn!("region {:?} unknown to the risk service, omitted", region),
			}
		}
		let mut sources: Vec<LocationId> = cases.keys().copied().collect();
		sources.sort();
		Query{
			geolevel: self.geolevel.value(),
			period,
			sources,
			cases,
			month: MONTHS[date.month0() as usize],
			travel_level,
			userdata: HashMap::new(),
		}
	}
}


/// Wire form of a risk query, base64-encoded JSON in the `q` parameter.
#[derive(Debug, Clone, Serialize)]
pub struct Query {
	pub geolevel: &'static str,
	pub period: u32,
	pub sources: Vec<LocationId>,
	pub cases: HashMap<LocationId, u64>,
	pub month: &'static str,
	pub travel_level: f64,
	pub userdata: HashMap<String, String>,
}

impl Query {
	pub fn encode(&self) -> Result<String, serde_json::Error> {
		Ok(base64::encode(serde_json::to_string(self)?))
	}
}


fn parse_id_keys<V, W, F: Fn(V) -> W>(raw: HashMap<String, V>, what: &'_ str, f: F) -> HashMap<LocationId, W> {
	let mut result = HashMap::with_capacity(raw.len());
	for (k, v) in raw {
		match k.parse::<LocationId>() {
			Ok(id) => {
				result.insert(id, f(v));
			},
			Err(_) => warn!("dropped {} entry with unparseable location id {:?}", what, k),
		}
	}
	result
}


#[derive(Debug, Deserialize)]
struct RawRisk {
	#[serde(default)]
	connections: HashMap<String, Vec<LocationId>>,
	distribution: HashMap<String, f64>,
	residual: f64,
}

/// Parsed `getrisk` response, still in service ids.
#[derive(Debug, Clone)]
pub struct ConnectionsRisk {
	pub connections: HashMap<LocationId, HashSet<LocationId>>,
	pub distribution: HashMap<LocationId, f64>,
	pub residual: f64,
}

impl ConnectionsRisk {
	pub fn from_json(s: &'_ str) -> Result<Self, Error> {
		let raw: RawRisk = serde_json::from_str(s)?;
		Ok(Self{
			connections: parse_id_keys(raw.connections, "connections", |v| v.into_iter().collect()),
			distribution: parse_id_keys(raw.distribution, "distribution", |v| v),
			residual: raw.residual,
		})
	}

	/// Translate the per-destination distribution back to region names.
	pub fn estimate(&self, nomenclature: &Nomenclature) -> RiskEstimate {
		let mut risks = HashMap::with_capacity(self.distribution.len());
		for (id, risk) in self.distribution.iter() {
			match nomenclature.label(*id) {
				Some(label) => {
					risks.insert(label.into(), *risk);
				},
				None => warn!("dropped risk for location id {} missing from nomenclature", id),
			}
		}
		RiskEstimate{
			risks,
			residual: self.residual,
		}
	}
}


/// Projected import risk per destination region.
#[derive(Debug, Clone)]
pub struct RiskEstimate {
	pub risks: HashMap<RegionName, f64>,
	pub residual: f64,
}


#[derive(Debug, Deserialize)]
struct RawDistribution {
	distribution: HashMap<String, f64>,
	residual: f64,
}

#[derive(Debug, Deserialize)]
struct RawExported {
	targets: HashMap<String, RawDistribution>,
}

/// Distribution of exported case counts, probability per count.
#[derive(Debug, Clone)]
pub struct Distribution {
	pub values: HashMap<u64, f64>,
	pub residual: f64,
}

/// Parsed `getexportedcases` response. `None` is the "world" target.
#[derive(Debug, Clone)]
pub struct ExportedCases {
	pub targets: HashMap<Option<LocationId>, Distribution>,
}

impl ExportedCases {
	pub fn from_json(s: &'_ str) -> Result<Self, Error> {
		let raw: RawExported = serde_json::from_str(s)?;
		let mut targets = HashMap::with_capacity(raw.targets.len());
		for (k, dist) in raw.targets {
			let target = if k == "world" {
				None
			} else {
				match k.parse::<LocationId>() {
					Ok(id) => Some(id),
					Err(_) => {
						warn!("dropped exported-cases target with unparseable id {:?}", k);
						continue;
					},
				}
			};
			let mut values = HashMap::with_capacity(dist.distribution.len());
			for (count, probability) in dist.distribution {
				match count.parse::<u64>() {
					Ok(count) => {
						values.insert(count, probability);
					},
					Err(_) => warn!("dropped exported-cases bucket with unparseable count {:?}", count),
				}
			}
			targets.insert(target, Distribution{
				values,
				residual: dist.residual,
			});
		}
		Ok(Self{
			targets,
		})
	}
}


/// Tables for the daily update, one risk snapshot per run.
pub struct RiskReport {
	pub risks: Table,
	pub connections: Table,
	pub exported: Table,
}


pub struct Client {
	client: reqwest::blocking::Client,
	risk_url: String,
	exported_url: String,
	nomenclature: Nomenclature,
	period: u32,
	travel_level: f64,
}

impl Client {
	pub fn connect(base_url: &'_ str, geolevel: GeoLevel, period: u32, travel_level: f64) -> Result<Self, Error> {
		let client = reqwest::blocking::Client::new();
		let body = http_get_text(&client, &format!("{}/era/getinitdata", base_url))?;
		let init: InitData = serde_json::from_str(&body)?;
		Ok(Self{
			client,
			risk_url: format!("{}/era/getrisk", base_url),
			exported_url: format!("{}/era/getexportedcases", base_url),
			nomenclature: Nomenclature::new(init, geolevel),
			period,
			travel_level,
		})
	}

	pub fn nomenclature(&self) -> &Nomenclature {
		&self.nomenclature
	}

	pub fn query_for(&self, date: NaiveDate, state: &EpidemicState) -> Query {
		self.nomenclature.state_query(date, state, self.period, self.travel_level)
	}

	fn get(&self, url: &'_ str, query: &Query) -> Result<String, Error> {
		let q = query.encode()?;
		let resp = self.client.get(url).query(&[("q", &q)]).send()?;
		let resp = resp.error_for_status()?;
		Ok(resp.text()?)
	}

	pub fn get_risk(&self, query: &Query) -> Result<ConnectionsRisk, Error> {
		ConnectionsRisk::from_json(&self.get(&self.risk_url, query)?)
	}

	pub fn get_exported_cases(&self, query: &Query) -> Result<ExportedCases, Error> {
		ExportedCases::from_json(&self.get(&self.exported_url, query)?)
	}

	/// Full snapshot for the daily update path: per-destination risks,
	/// connections and exported-case distributions as tables.
	pub fn report(&self, date: NaiveDate, state: &EpidemicState) -> Result<RiskReport, Error> {
		let query = self.query_for(date, state);
		let risk = self.get_risk(&query)?;
		let exported = self.get_exported_cases(&query)?;

		let name = |id: LocationId| -> String {
			self.nomenclature.label(id).unwrap_or("unknown").to_string()
		};

		let mut risks = Table::new(vec!["Country".into(), "Risk".into()]);
		let mut dist: Vec<_> = risk.distribution.iter().collect();
		dist.sort_by(|a, b| a.0.cmp(b.0));
		for (id, value) in dist {
			risks.push_row(vec![Cell::from(name(*id)), Cell::from(*value)]);
		}

		let mut connections = Table::new(vec!["Country".into(), "Destination".into()]);
		let mut conns: Vec<_> = risk.connections.iter().collect();
		conns.sort_by(|a, b| a.0.cmp(b.0));
		for (id, dests) in conns {
			let mut dests: Vec<_> = dests.iter().collect();
			dests.sort();
			for dest in dests {
				connections.push_row(vec![Cell::from(name(*id)), Cell::from(name(*dest))]);
			}
		}

		let mut exported_table = Table::new(vec!["Where".into(), "Value".into(), "Probability".into()]);
		let mut targets: Vec<_> = exported.targets.iter().collect();
		targets.sort_by(|a, b| a.0.cmp(b.0));
		for (target, dist) in targets {
			let where_name = match target {
				Some(id) => name(*id),
				None => "world".to_string(),
			};
			let mut values: Vec<_> = dist.values.iter().collect();
			values.sort_by(|a, b| a.0.cmp(b.0));
			for (value, probability) in values {
				exported_table.push_row(vec![
					Cell::from(where_name.as_str()),
					Cell::from(*value),
					Cell::from(*probability),
				]);
			}
		}

		Ok(RiskReport{
			risks,
			connections,
			exported: exported_table,
		})
	}
}


pub trait RiskEstimator {
	fn estimate_risk(&self, date: NaiveDate, state: &EpidemicState) -> Result<RiskEstimate, Error>;
}

impl RiskEstimator for Client {
	fn estimate_risk(&self, date: NaiveDate, state: &EpidemicState) -> Result<RiskEstimate, Error> {
		let query = self.query_for(date, state);
		Ok(self.get_risk(&query)?.estimate(&self.nomenclature))
	}
}


/// Replay the risk query once per historical day, in order.
///
/// A failed day is logged and omitted so a single bad day cannot abort
/// the whole backfill.
pub fn backfill_history<E: RiskEstimator>(
	estimator: &E,
	states: &[(NaiveDate, EpidemicState)],
) -> Vec<(NaiveDate, RiskEstimate)> {
	let mut result = Vec::with_capacity(states.len());
	let mut pm = ProgressMeter::start(Some(states.len()));
	for (i, (date, state)) in states.iter().enumerate() {
		match estimator.estimate_risk(*date, state) {
			Ok(estimate) => result.push((*date, estimate)),
			Err(e) => warn!("risk estimate for {} failed, day omitted: {}", date, e),
		}
		pm.update(i + 1);
	}
	pm.finish(Some(states.len()));
	result
}


/// Date-indexed risk series from a backfill run.
pub fn history_table(estimates: &[(NaiveDate, RiskEstimate)]) -> Table {
	let mut table = Table::new(vec!["Date".into(), "Country".into(), "Risk".into()]);
	for (date, estimate) in estimates {
		let mut risks: Vec<_> = estimate.risks.iter().collect();
		risks.sort_by(|a, b| a.0.cmp(b.0));
		for (region, risk) in risks {
			table.push_row(vec![
				Cell::from(*date),
				Cell::from(region.as_str()),
				Cell::from(*risk),
			]);
		}
	}
	table
}


#[cfg(test)]
mod tests {
	use super::*;

	fn loc(id: LocationId, label: &str) -> Location {
		Location{
			id,
			label: label.to_string(),
			lat: 0.0,
			lng: 0.0,
			population: 1000,
		}
	}

	fn nomenclature() -> Nomenclature {
		Nomenclature::new(InitData{
			basins: vec![],
			countries: vec![
				loc(169, "Poland"),
				loc(380, "Italy"),
				loc(756, "China"),
			],
		}, GeoLevel::Country)
	}

	fn d(s: &str) -> NaiveDate {
		s.parse::<NaiveDate>().unwrap()
	}

	#[test]
	fn state_query_encodes_base64_json() {
		let n = nomenclature();
		let mut state = EpidemicState::new();
		state.insert("Poland".into(), 100);
		state.insert("Atlantis".into(), 5);
		let query = n.state_query(d("2020-01-30"), &state, 10, 1.0);
		assert_eq!(query.sources, vec![169]);
		assert_eq!(query.cases.get(&169).copied(), Some(100));

		let decoded = base64::decode(query.encode().unwrap()).unwrap();
		let json: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
		assert_eq!(json["geolevel"], "country");
		assert_eq!(json["month"], "Jan");
		assert_eq!(json["period"], 10);
		assert_eq!(json["travel_level"], 1.0);
		assert_eq!(json["cases"]["169"], 100);
	}

	#[test]
	fn risk_response_translates_to_region_names() {
		// estimate for {Poland: 100} against a stub answering {Italy: 0.3}
		let n = nomenclature();
		let risk = ConnectionsRisk::from_json(
			r#"{"connections": {"169": [380]}, "distribution": {"380": 0.3}, "residual": 0.7}"#,
		).unwrap();
		assert_eq!(risk.connections.get(&169).unwrap().len(), 1);
		let estimate = risk.estimate(&n);
		assert_eq!(estimate.risks.get("Italy").copied(), Some(0.3));
		assert_eq!(estimate.risks.len(), 1);
		assert_eq!(estimate.residual, 0.7);
	}

	#[test]
	fn unknown_ids_in_response_are_dropped() {
		let n = nomenclature();
		let risk = ConnectionsRisk::from_json(
			r#"{"distribution": {"380": 0.3, "9999": 0.1, "bogus": 0.2}, "residual": 0.4}"#,
		).unwrap();
		let estimate = risk.estimate(&n);
		assert_eq!(estimate.risks.len(), 1);
		assert!(estimate.risks.contains_key("Italy"));
	}

	#[test]
	fn exported_cases_world_target() {
		let exported = ExportedCases::from_json(
			r#"{"targets": {"world": {"distribution": {"0": 0.5, "1": 0.3}, "residual": 0.2},
			"380": {"distribution": {"1": 1.0}, "residual": 0.0}}}"#,
		).unwrap();
		let world = exported.targets.get(&None).unwrap();
		assert_eq!(world.values.get(&0).copied(), Some(0.5));
		let italy = exported.targets.get(&Some(380)).unwrap();
		assert_eq!(italy.values.get(&1).copied(), Some(1.0));
	}

	struct StubEstimator {
		fail_on: NaiveDate,
	}

	impl RiskEstimator for StubEstimator {
		fn estimate_risk(&self, date: NaiveDate, state: &EpidemicState) -> Result<RiskEstimate, Error> {
			if date == self.fail_on {
				// any transport-ish error will do for the test
				return Err(Error::Decode(serde_json::from_str::<serde_json::Value>("").unwrap_err()))
			}
			let mut risks = HashMap::new();
			risks.insert("Italy".into(), state.len() as f64);
			Ok(RiskEstimate{
				risks,
				residual: 0.0,
			})
		}
	}

	#[test]
	fn backfill_skips_failed_days_and_keeps_order() {
		let mut state = EpidemicState::new();
		state.insert("Poland".into(), 1);
		let states: Vec<_> = (1..=5).map(|day| {
			(NaiveDate::from_ymd(2020, 2, day), state.clone())
		}).collect();
		let stub = StubEstimator{
			fail_on: d("2020-02-03"),
		};
		let result = backfill_history(&stub, &states);
		assert_eq!(result.len(), 4);
		let dates: Vec<_> = result.iter().map(|(date, _)| *date).collect();
		assert_eq!(dates, vec![
			d("2020-02-01"), d("2020-02-02"), d("2020-02-04"), d("2020-02-05"),
		]);
	}
}
