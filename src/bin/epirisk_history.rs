use std::io;
use std::process::exit;

use corona::epirisk;
use corona::sheets;
use corona::{CaseData, Config};


static USAGE: &'static str = "\
Usage:
epirisk_history [SETTINGS]

Replays the risk-estimation query once per historical day and publishes
the resulting date-indexed risk series. Uses the SETTINGS file, default
settings.toml in the current directory.
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

	println!("fetching case data ...");
	let http = reqwest::blocking::Client::new();
	let cases = CaseData::fetch(&http, &config.sources.cases_base_url)?;

	println!("connecting to risk estimation ...");
	let epirisk_client = epirisk::Client::connect(
		&config.epirisk.base_url,
		epirisk::GeoLevel::Country,
		config.epirisk.period,
		config.epirisk.travel_level,
	)?;

	// one snapshot per day with any reported cases, oldest first
	let states: Vec<_> = cases.confirmed.dates()
		.map(|date| (date, cases.state_at(date)))
		.filter(|(_, state)| !state.is_empty())
		.collect();

	println!("replaying {} days of risk queries ...", states.len());
	let estimates = epirisk::backfill_history(&epirisk_client, &states);
	println!("{} of {} days estimated", estimates.len(), states.len());

	println!("publishing ...");
	let sheets_client = sheets::Client::new(config.sheets.api_url.clone(), config.sheets_auth());
	let target = &config.sheets.exports.risk_history;
	sheets_client.publish(&target.spreadsheet, &target.range, &epirisk::history_table(&estimates))?;

	println!("done");
	Ok(())
}
