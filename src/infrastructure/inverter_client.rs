// Process-data fetch against the inverter's local API
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::application::ports::{FetchError, TelemetrySource};
use crate::domain::data_point::DataPoint;

const PROCESS_DATA: &str = "processdata";
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Fetches the live measurement channels and assembles a `DataPoint`.
pub struct InverterClient {
    base_url: String,
    http: reqwest::Client,
    request: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ProcessDataModule {
    processdata: Vec<ProcessDataValue>,
}

#[derive(Debug, Deserialize)]
struct ProcessDataValue {
    value: f64,
}

/// Channel selection sent with every fetch. The device answers with the
/// same modules in the same order, each module's channels ordered by id.
fn process_data_request() -> serde_json::Value {
    json!([
        { "moduleid": "devices:local:pv1", "processdataids": ["P"] },
        { "moduleid": "devices:local:pv2", "processdataids": ["P"] },
        { "moduleid": "devices:local:battery", "processdataids": ["P", "SoC"] },
        { "moduleid": "devices:local", "processdataids":
            ["Grid_P", "Home_P", "HomeGrid_P", "HomeOwn_P", "HomeBat_P", "PV2Bat_P"] },
    ])
}

fn channel(modules: &[ProcessDataModule], module: usize, position: usize) -> Result<i64, FetchError> {
    modules
        .get(module)
        .and_then(|m| m.processdata.get(position))
        .map(|v| v.value.round() as i64)
        .ok_or_else(|| FetchError::Malformed(format!("missing channel {module}/{position}")))
}

impl InverterClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            request: process_data_request(),
        })
    }

    // Offsets below mirror the by-id channel ordering within each module:
    // battery answers P before SoC, devices:local answers Grid_P first,
    // Home_P fifth and PV2Bat_P last. Grid and battery power are signed
    // (draw/discharge positive), everything stored is clamped non-negative.
    fn parse_response(modules: &[ProcessDataModule], timestamp: i64) -> Result<DataPoint, FetchError> {
        let pv1 = channel(modules, 0, 0)?;
        let pv2 = channel(modules, 1, 0)?;
        let battery_p = channel(modules, 2, 0)?;
        let battery_soc = channel(modules, 2, 1)?;
        let grid_p = channel(modules, 3, 0)?;
        let pv_to_battery = channel(modules, 3, 5)?;

        Ok(DataPoint {
            timestamp,
            power_from_pv: (pv1 + pv2).max(0),
            power_from_grid: grid_p.max(0),
            power_from_battery: battery_p.max(0),
            power_to_battery: pv_to_battery.max(0),
            power_to_grid: (-grid_p).max(0),
            battery_soc: battery_soc.max(0),
        })
    }
}

#[async_trait]
impl TelemetrySource for InverterClient {
    async fn fetch_current(&self, session_id: &str) -> Result<DataPoint, FetchError> {
        let url = format!("{}/{}", self.base_url, PROCESS_DATA);
        let response = self
            .http
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Session {session_id}"),
            )
            .json(&self.request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let modules = response
            .json::<Vec<ProcessDataModule>>()
            .await
            .map_err(|err| FetchError::Malformed(err.to_string()))?;
        Self::parse_response(&modules, Utc::now().timestamp())
    }
}
