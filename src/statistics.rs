use std::collections::HashMap;
use std::sync::Arc;

use crate::hopkins::CaseData;
use crate::regions::{RegionInfo, RegionName};
use crate::sheets::{Cell, Table};


/// Per-date aggregate counts for the whole world and for Europe: confirmed,
/// deaths, recoveries and the number of affected regions.
pub fn big_numbers(cases: &CaseData, regions: &HashMap<RegionName, Arc<RegionInfo>>) -> Table {
	let mut table = Table::new(vec![
		"Region".into(),
		"Date".into(),
		"Confirmed".into(),
		"Deaths".into(),
		"Recovered".into(),
		"Countries".into(),
	]);

	for (label, continent) in [("World", None), ("EU", Some("Europe"))].iter() {
		let in_scope = |k: &RegionName| -> bool {
			match continent {
				None => true,
				Some(c) => regions.get(k).map(|info| info.continent == *c).unwrap_or(false),
			}
		};
		let confirmed = cases.confirmed.rekeyed(|k| if in_scope(k) { Some(()) } else { None });
		let deaths = cases.deaths.rekeyed(|k| if in_scope(k) { Some(()) } else { None });
		let recovered = cases.recovered.rekeyed(|k| if in_scope(k) { Some(()) } else { None });
		let scoped_keys: Vec<&RegionName> = cases.confirmed.keys().filter(|k| in_scope(k)).collect();

		for (i, date) in cases.confirmed.dates().enumerate() {
			let c = confirmed.get_value(&(), i).unwrap_or(0);
			if c == 0 {
				continue;
			}
			let d = deaths.date_index(date)
				.and_then(|j| deaths.get_value(&(), j))
				.unwrap_or(0);
			let r = recovered.date_index(date)
				.and_then(|j| recovered.get_value(&(), j))
				.unwrap_or(0);
			let affected = scoped_keys.iter()
				.filter(|k| cases.confirmed.get_value(**k, i).unwrap_or(0) > 0)
				.count();
			table.push_row(vec![
				Cell::from(*label),
				Cell::from(date),
				Cell::from(c),
				Cell::from(d),
				Cell::from(r),
				Cell::from(affected as u64),
			]);
		}
	}
	table
}


#[cfg(test)]
mod tests {
	use super::*;
	use crate::hopkins::parse_series;
	use crate::regions::load_regions;
	use crate::timeseries::Counters;

	static REGIONS_CSV: &'static str = "\
name,ISO3,continent,population
China,CHN,Asia,1402112000
Italy,ITA,Europe,59554023
France,FRA,Europe,67391582
";

	#[test]
	fn world_and_europe_aggregates_per_date() {
		let confirmed = parse_series("\
Province/State,Country/Region,Lat,Long,1/22/20,1/23/20
,China,30.0,112.0,100,150
,Italy,43.0,12.0,0,3
,France,46.2,2.2,0,2
".as_bytes(), "Confirmed").unwrap();
		let start = confirmed.start();
		let cases = CaseData{
			confirmed,
			deaths: Counters::new(start, start),
			recovered: Counters::new(start, start),
		};
		let mut regions_csv = REGIONS_CSV.as_bytes();
		let regions = load_regions(&mut regions_csv).unwrap();

		let table = big_numbers(&cases, &regions);
		// World rows for both dates, an EU row only for the second
		assert_eq!(table.rows().len(), 3);
		assert_eq!(table.rows()[0][0], Cell::from("World"));
		assert_eq!(table.rows()[0][2], Cell::Int(100));
		assert_eq!(table.rows()[0][5], Cell::Int(1));
		assert_eq!(table.rows()[1][2], Cell::Int(155));
		assert_eq!(table.rows()[1][5], Cell::Int(3));
		assert_eq!(table.rows()[2][0], Cell::from("EU"));
		assert_eq!(table.rows()[2][2], Cell::Int(5));
		assert_eq!(table.rows()[2][5], Cell::Int(2));
	}
}
