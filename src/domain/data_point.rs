// Power-flow measurement domain model
use serde::{Deserialize, Serialize};

/// One timestamped snapshot of inverter, battery and grid power flow.
/// All power fields are watts and never negative; `timestamp` is epoch
/// seconds. Points are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    pub timestamp: i64,
    #[serde(rename = "powerFromPV")]
    pub power_from_pv: i64,
    #[serde(rename = "powerFromGrid")]
    pub power_from_grid: i64,
    #[serde(rename = "powerFromBattery")]
    pub power_from_battery: i64,
    #[serde(rename = "powerToBattery")]
    pub power_to_battery: i64,
    #[serde(rename = "powerToGrid")]
    pub power_to_grid: i64,
    #[serde(rename = "batterySoC")]
    pub battery_soc: i64,
}

impl DataPoint {
    /// Household consumption derived from the flow balance.
    pub fn home_total(&self) -> i64 {
        self.power_from_pv + self.power_from_grid + self.power_from_battery
            - self.power_to_battery
            - self.power_to_grid
    }

    /// Field-wise average over a set of points, `None` when empty.
    pub fn average_of(points: &[DataPoint]) -> Option<DataPoint> {
        if points.is_empty() {
            return None;
        }
        let count = points.len() as i64;
        let mut sum = DataPoint {
            timestamp: 0,
            power_from_pv: 0,
            power_from_grid: 0,
            power_from_battery: 0,
            power_to_battery: 0,
            power_to_grid: 0,
            battery_soc: 0,
        };
        for point in points {
            sum.timestamp += point.timestamp;
            sum.power_from_pv += point.power_from_pv;
            sum.power_from_grid += point.power_from_grid;
            sum.power_from_battery += point.power_from_battery;
            sum.power_to_battery += point.power_to_battery;
            sum.power_to_grid += point.power_to_grid;
            sum.battery_soc += point.battery_soc;
        }
        Some(DataPoint {
            timestamp: sum.timestamp / count,
            power_from_pv: sum.power_from_pv / count,
            power_from_grid: sum.power_from_grid / count,
            power_from_battery: sum.power_from_battery / count,
            power_to_battery: sum.power_to_battery / count,
            power_to_grid: sum.power_to_grid / count,
            battery_soc: sum.battery_soc / count,
        })
    }
}
