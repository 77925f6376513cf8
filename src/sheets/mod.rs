use std::fmt;

use log::trace;

use reqwest;

use serde::{Serialize, Deserialize};

mod values;

pub use values::{Cell, Table, ValueRange};


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Auth {
	None,
	Bearer{token: String},
	Query{key: String},
}

impl Auth {
	pub fn apply(&self, req: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
		match self {
			Self::None => req,
			Self::Bearer{token} => req.header("Authorization", format!("Bearer {}", token)),
			Self::Query{key} => req.query(&[("key", key)]),
		}
	}
}


#[derive(Debug)]
pub enum Error {
	Request(reqwest::Error),
	Json(serde_json::Error),
	PermissionDenied,
	WriteRejected,
	SheetNotFound,
	UnexpectedSuccessStatus,
}

impl fmt::Display for Error {
	fn fmt<'f>(&self, f: &'f mut fmt::Formatter) -> fmt::Result {
		match self {
			Self::Request(e) => fmt::Display::fmt(e, f),
			Self::Json(e) => fmt::Display::fmt(e, f),
			Self::PermissionDenied => write!(f, "spreadsheet credentials rejected"),
			Self::WriteRejected => write!(f, "spreadsheet write rejected"),
			Self::SheetNotFound => write!(f, "spreadsheet or range not found"),
			Self::UnexpectedSuccessStatus => write!(f, "unexpected success status"),
		}
	}
}

impl From<reqwest::Error> for Error {
	fn from(err: reqwest::Error) -> Self {
		Self::Request(err)
	}
}

impl std::error::Error for Error {}


fn check_status(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response, Error> {
	match resp.error_for_status_ref() {
		Ok(_) => match resp.status() {
			reqwest::StatusCode::OK => Ok(resp),
			_ => Err(Error::UnexpectedSuccessStatus),
		},
		Err(e) => match e.status().unwrap() {
			reqwest::StatusCode::FORBIDDEN | reqwest::StatusCode::UNAUTHORIZED => Err(Error::PermissionDenied),
			reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::PAYLOAD_TOO_LARGE => Err(Error::WriteRejected),
			reqwest::StatusCode::NOT_FOUND => Err(Error::SheetNotFound),
			_ => Err(Error::Request(e)),
		},
	}
}


#[derive(Debug, Deserialize)]
struct ValueRangeResponse {
	#[serde(default)]
	values: Vec<Vec<serde_json::Value>>,
}


pub struct Client {
	client: reqwest::blocking::Client,
	api_url: String,
	auth: Auth,
}

impl Client {
	pub fn new(api_url: String, auth: Auth) -> Self {
		Self{
			client: reqwest::blocking::Client::new(),
			api_url,
			auth,
		}
	}

	fn values_url(&self, spreadsheet_id: &'_ str, range: &'_ str, suffix: &'_ str) -> String {
		format!("{}/v4/spreadsheets/{}/values/{}{}", self.api_url, spreadsheet_id, range, suffix)
	}

	/// Replace the contents of a range with the given table.
	///
	/// The range is cleared first, so repeated publishes of the same table
	/// converge to identical sheet contents.
	pub fn publish(&self, spreadsheet_id: &'_ str, range: &'_ str, table: &Table) -> Result<(), Error> {
		trace!("clearing {} {}", spreadsheet_id, range);
		let req = self.client.post(self.values_url(spreadsheet_id, range, ":clear"));
		let req = self.auth.apply(req).header("Content-Length", "0");
		check_status(req.send()?)?;

		trace!("writing {} rows to {} {}", table.rows().len(), spreadsheet_id, range);
		let body = serde_json::to_vec(&table.value_range(range)).map_err(Error::Json)?;
		let req = self.client.put(self.values_url(spreadsheet_id, range, ""));
		let req = self.auth.apply(req)
			.query(&[("valueInputOption", "RAW")])
			.header("Content-Type", "application/json")
			.body(body);
		check_status(req.send()?)?;
		Ok(())
	}

	/// Read a range back as rows of strings.
	pub fn get_values(&self, spreadsheet_id: &'_ str, range: &'_ str) -> Result<Vec<Vec<String>>, Error> {
		let req = self.client.get(self.values_url(spreadsheet_id, range, ""));
		let resp = check_status(self.auth.apply(req).send()?)?;
		let parsed: ValueRangeResponse = serde_json::from_str(&resp.text()?).map_err(Error::Json)?;
		let rows = parsed.values.into_iter().map(|row| {
			row.into_iter().map(|v| match v {
				serde_json::Value::String(s) => s,
				serde_json::Value::Null => String::new(),
				other => other.to_string(),
			}).collect()
		}).collect();
		Ok(rows)
	}
}
