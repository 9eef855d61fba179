// Relay of data points to the remote collector
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, TimeZone};
use serde_json::json;

use crate::application::ports::{DownstreamForwarder, FetchError};
use crate::domain::data_point::DataPoint;

const SEND_DATA: &str = "send_data.php";
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

pub struct CollectorClient {
    base_url: String,
    http: reqwest::Client,
}

// The collector expects local wall-clock time without a zone offset.
fn local_time_string(timestamp: i64) -> String {
    Local
        .timestamp_opt(timestamp, 0)
        .single()
        .map(|time| time.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn relay_payload(point: &DataPoint) -> serde_json::Value {
    json!({
        "Time": local_time_string(point.timestamp),
        "PV": point.power_from_pv,
        "FromGrid": point.power_from_grid,
        "FromBat": point.power_from_battery,
        "Home_Total": point.home_total(),
        "Battery_Level": point.battery_soc,
    })
}

impl CollectorClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(CALL_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl DownstreamForwarder for CollectorClient {
    async fn forward(&self, point: &DataPoint, session_id: &str) -> Result<(), FetchError> {
        let url = format!("{}/{}", self.base_url, SEND_DATA);
        let response = self
            .http
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Session {session_id}"),
            )
            .json(&relay_payload(point))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FetchError::Unauthorized);
        }
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(())
    }
}
