use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use serde::Deserialize;

use smartstring::alias::{String as SmartString};


/// Canonical region name, as the risk-estimation service spells it.
pub type RegionName = SmartString;


#[derive(Debug, Clone)]
pub struct RegionInfo {
	pub name: RegionName,
	pub iso3: String,
	pub continent: String,
	pub population: u64,
}


#[derive(Debug, Clone, Deserialize)]
pub struct RawRegionRow {
	#[serde(rename = "name")]
	pub name: String,
	#[serde(rename = "ISO3")]
	pub iso3: String,
	#[serde(rename = "continent")]
	pub continent: String,
	#[serde(rename = "population")]
	pub population: u64,
}


pub fn load_regions<R: io::Read>(r: &mut R) -> Result<HashMap<RegionName, Arc<RegionInfo>>, io::Error> {
	let mut regions = HashMap::new();
	let mut r = csv::Reader::from_reader(r);
	for row in r.deserialize() {
		let rec: RawRegionRow = row?;
		let info = Arc::new(RegionInfo{
			name: rec.name.into(),
			iso3: rec.iso3,
			continent: rec.continent,
			population: rec.population,
		});
		regions.insert(info.name.clone(), info);
	}
	Ok(regions)
}


/// Map the case-data source's region naming to the canonical naming.
///
/// The source CSVs report some territories separately and spell several
/// country names differently than the risk-estimation nomenclature does;
/// rows have to be folded onto the canonical name before any join.
pub fn adjust_region_name(name: &str) -> &str {
	match name {
		"Hong Kong" | "Macau" | "Mainland China" => "China",
		"South Korea" | "Korea, South" => "Korea, Rep.",
		"US" => "United States of America",
		"Russia" => "Russian Federation",
		"UK" => "United Kingdom",
		"Egypt" => "Egypt, Arab Rep.",
		other => other,
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	static REGIONS_CSV: &'static str = "\
name,ISO3,continent,population
China,CHN,Asia,1402112000
Italy,ITA,Europe,59554023
United States of America,USA,America,331002651
";

	#[test]
	fn load_regions_keys_by_canonical_name() {
		let mut r = REGIONS_CSV.as_bytes();
		let regions = load_regions(&mut r).unwrap();
		assert_eq!(regions.len(), 3);
		let italy = regions.get("Italy").unwrap();
		assert_eq!(italy.iso3, "ITA");
		assert_eq!(italy.continent, "Europe");
		assert_eq!(italy.population, 59554023);
	}

	#[test]
	fn adjust_region_name_folds_territories() {
		assert_eq!(adjust_region_name("Hong Kong"), "China");
		assert_eq!(adjust_region_name("Mainland China"), "China");
		assert_eq!(adjust_region_name("US"), "United States of America");
		assert_eq!(adjust_region_name("Italy"), "Italy");
	}
}
