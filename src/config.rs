use std::env;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;

use crate::sheets;


static TOKEN_ENV_VAR: &'static str = "CORONA_SHEETS_TOKEN";


fn default_cases_base_url() -> String {
	"https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/".to_string()
}

fn default_epirisk_url() -> String {
	"http://epirisk.net".to_string()
}

fn default_period() -> u32 {
	10
}

fn default_travel_level() -> f64 {
	1.0
}

fn default_sheets_api_url() -> String {
	"https://sheets.googleapis.com".to_string()
}

fn default_range() -> String {
	"Sheet1".to_string()
}

fn default_metadata_range() -> String {
	"base".to_string()
}

fn default_onset_threshold() -> u64 {
	10
}


#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
	#[serde(default = "default_cases_base_url")]
	pub cases_base_url: String,
	pub regions_file: String,
	pub historical_file: Option<String>,
}


#[derive(Debug, Clone, Deserialize)]
pub struct EpiriskConfig {
	#[serde(default = "default_epirisk_url")]
	pub base_url: String,
	#[serde(default = "default_period")]
	pub period: u32,
	#[serde(default = "default_travel_level")]
	pub travel_level: f64,
}

impl Default for EpiriskConfig {
	fn default() -> Self {
		Self{
			base_url: default_epirisk_url(),
			period: default_period(),
			travel_level: default_travel_level(),
		}
	}
}


#[derive(Debug, Clone, Deserialize)]
pub struct SheetTarget {
	pub spreadsheet: String,
	#[serde(default = "default_range")]
	pub range: String,
}


#[derive(Debug, Clone, Deserialize)]
pub struct ExportsConfig {
	pub cases: SheetTarget,
	pub comparison: SheetTarget,
	pub epidemic_days: SheetTarget,
	// worksheet of the epidemic_days spreadsheet holding the metadata of
	// prior epidemics
	#[serde(default = "default_metadata_range")]
	pub epidemic_days_base: String,
	pub connections: SheetTarget,
	pub risks: SheetTarget,
	pub exported: SheetTarget,
	pub big_numbers: SheetTarget,
	pub risk_history: SheetTarget,
}


#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
	#[serde(default = "default_sheets_api_url")]
	pub api_url: String,
	pub token: Option<String>,
	pub exports: ExportsConfig,
}


#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default = "default_onset_threshold")]
	pub onset_threshold: u64,
	pub sources: SourcesConfig,
	#[serde(default)]
	pub epirisk: EpiriskConfig,
	pub sheets: SheetsConfig,
}

impl Config {
	pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
		let raw = fs::read_to_string(path)?;
		toml::from_str(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
	}

	/// Token from the settings file, falling back to the environment.
	pub fn sheets_auth(&self) -> sheets::Auth {
		match self.sheets.token.clone().or_else(|| env::var(TOKEN_ENV_VAR).ok()) {
			Some(token) => sheets::Auth::Bearer{token},
			None => sheets::Auth::None,
		}
	}
}


#[cfg(test)]
mod tests {
	use super::*;

	static SETTINGS: &'static str = r#"
[sources]
regions_file = "regions.csv"
historical_file = "historic.csv.gz"

[epirisk]
period = 6

[sheets]
token = "tok"

[sheets.exports]
cases = { spreadsheet = "id-cases" }
comparison = { spreadsheet = "id-comparison" }
epidemic_days = { spreadsheet = "id-days", range = "days" }
connections = { spreadsheet = "id-conn" }
risks = { spreadsheet = "id-risks" }
exported = { spreadsheet = "id-exported" }
big_numbers = { spreadsheet = "id-big" }
risk_history = { spreadsheet = "id-history" }
"#;

	#[test]
	fn parse_with_defaults() {
		let config: Config = toml::from_str(SETTINGS).unwrap();
		assert_eq!(config.onset_threshold, 10);
		assert_eq!(config.epirisk.period, 6);
		assert_eq!(config.epirisk.travel_level, 1.0);
		assert!(config.epirisk.base_url.contains("epirisk"));
		assert_eq!(config.sheets.exports.cases.range, "Sheet1");
		assert_eq!(config.sheets.exports.epidemic_days.range, "days");
		assert_eq!(config.sheets.exports.epidemic_days_base, "base");
		assert_eq!(config.sources.historical_file.as_deref(), Some("historic.csv.gz"));
	}

	#[test]
	fn configured_token_becomes_bearer_auth() {
		let config: Config = toml::from_str(SETTINGS).unwrap();
		match config.sheets_auth() {
			sheets::Auth::Bearer{token} => assert_eq!(token, "tok"),
			other => panic!("unexpected auth: {:?}", other),
		}
	}
}
