//! The laboratory information management system (LIMS).
//!
//! The pipeline only asks the LIMS two things: the sample sheet for a flow
//! cell (when the run directory does not contain one) and the analysis plan
//! for a project (to decide what is mirrored to the HPC cluster).

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;

/// An error related to the LIMS.
#[derive(Debug)]
pub enum Error {
    /// An HTTP error.
    Http(reqwest::Error),
    /// The LIMS returned an unexpected status.
    Status(StatusCode, String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(err) => write!(f, "http error: {err}"),
            Error::Status(status, url) => write!(f, "unexpected status `{status}` from {url}"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A LIMS.
pub trait Lims {
    /// Gets the sample sheet registered for a flow cell, if any.
    fn sample_sheet(&self, flowcell: &str) -> Result<Option<String>>;

    /// Gets the analysis plan of a project, if any.
    fn analysis_plan(&self, project: &str) -> Result<Option<String>>;
}

/// A LIMS that knows nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoLims;

impl Lims for NoLims {
    fn sample_sheet(&self, _: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn analysis_plan(&self, _: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// The project record returned by the LIMS.
#[derive(Debug, Deserialize)]
struct ProjectRecord {
    /// The analysis plan.
    #[serde(default)]
    analysis_plan: Option<String>,
}

/// A LIMS reached over a JSON HTTP API.
///
/// * `GET {url}/flowcells/{flowcell}/samplesheet` returns the sample sheet
///   as text (or `404`).
/// * `GET {url}/projects/{project}` returns `{"analysis_plan": "..."}` (or
///   `404`).
#[derive(Clone, Debug)]
pub struct HttpLims {
    /// The base URL.
    url: String,
    /// The HTTP client.
    client: Client,
}

impl HttpLims {
    /// Creates a LIMS client.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Performs a `GET`, mapping `404` to [`None`].
    fn get(&self, path: &str) -> Result<Option<reqwest::blocking::Response>> {
        let url = format!("{}/{}", self.url, path);
        let response = self.client.get(&url).send().map_err(Error::Http)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(Error::Status(status, url)),
        }
    }
}

impl Lims for HttpLims {
    fn sample_sheet(&self, flowcell: &str) -> Result<Option<String>> {
        self.get(&format!("flowcells/{flowcell}/samplesheet"))?
            .map(|response| response.text().map_err(Error::Http))
            .transpose()
    }

    fn analysis_plan(&self, project: &str) -> Result<Option<String>> {
        let record = self
            .get(&format!("projects/{project}"))?
            .map(|response| response.json::<ProjectRecord>().map_err(Error::Http))
            .transpose()?;

        Ok(record.and_then(|record| record.analysis_plan))
    }
}
