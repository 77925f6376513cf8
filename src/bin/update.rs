use std::io;
use std::process::exit;

use corona::epirisk;
use corona::sheets;
use corona::{
	big_numbers, epidemic_summaries, load_historic, load_regions, magic_open,
	CaseData, ComparisonSeries, Config, CURRENT_EPIDEMIC,
};


static USAGE: &'static str = "\
Usage:
update [SETTINGS]

Updates the dashboard data using the SETTINGS file. If SETTINGS is not
given, tries to load settings.toml in the current directory.

If the spreadsheet token is not set in the SETTINGS file, it is read
from the CORONA_SHEETS_TOKEN environment variable.
";


fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::init();

	let argv: Vec<String> = std::env::args().collect();
	let settings = if argv.len() >= 2 {
		argv[1].clone()
	} else {
		"settings.toml".to_string()
	};
	println!("using settings {}", settings);
	let config = match Config::load(&settings) {
		Ok(config) => config,
		Err(e) if e.kind() == io::ErrorKind::NotFound => {
			eprintln!("{}", USAGE);
			exit(1);
		},
		Err(e) => return Err(e.into()),
	};

	let regions = {
		let mut r = magic_open(&config.sources.regions_file)?;
		load_regions(&mut r)?
	};

	println!("fetching case data ...");
	let http = reqwest::blocking::Client::new();
	let cases = CaseData::fetch(&http, &config.sources.cases_base_url)?;

	println!("aligning epidemics ...");
	let mut comparison = ComparisonSeries::new(config.onset_threshold);
	if let Some(path) = &config.sources.historical_file {
		let historic = load_historic(magic_open(path)?)?;
		comparison.extend_from_historic(&historic);
	}
	let global_deaths = cases.global_deaths();
	let deaths_by_confirmed_date: Vec<u64> = cases.confirmed.dates().map(|date| {
		cases.deaths.date_index(date).map(|j| global_deaths[j]).unwrap_or(0)
	}).collect();
	comparison.push(CURRENT_EPIDEMIC.into(), &cases.global_confirmed(), &deaths_by_confirmed_date);

	let sheets_client = sheets::Client::new(config.sheets.api_url.clone(), config.sheets_auth());
	let exports = &config.sheets.exports;

	println!("building summaries ...");
	let base_rows = sheets_client.get_values(
		&exports.epidemic_days.spreadsheet,
		&exports.epidemic_days_base,
	)?;
	let summaries = epidemic_summaries(&cases, &base_rows);

	println!("querying risk estimation ...");
	let epirisk_client = epirisk::Client::connect(
		&config.epirisk.base_url,
		epirisk::GeoLevel::Country,
		config.epirisk.period,
		config.epirisk.travel_level,
	)?;
	let (latest_date, latest_state) = cases.latest_state();
	let report = epirisk_client.report(latest_date, &latest_state)?;

	println!("publishing ...");
	sheets_client.publish(&exports.cases.spreadsheet, &exports.cases.range, &cases.table())?;
	sheets_client.publish(&exports.comparison.spreadsheet, &exports.comparison.range, &comparison.table())?;
	sheets_client.publish(&exports.epidemic_days.spreadsheet, &exports.epidemic_days.range, &summaries)?;
	sheets_client.publish(&exports.connections.spreadsheet, &exports.connections.range, &report.connections)?;
	sheets_client.publish(&exports.risks.spreadsheet, &exports.risks.range, &report.risks)?;
	sheets_client.publish(&exports.exported.spreadsheet, &exports.exported.range, &report.exported)?;
	sheets_client.publish(&exports.big_numbers.spreadsheet, &exports.big_numbers.range, &big_numbers(&cases, &regions))?;

	println!("done");
	Ok(())
}
