//! Typed view over the raw metrics TeslaMate publishes for a car.
//!
//! Every field is optional: a metric that was never received, or whose value
//! does not parse, is left out of the response instead of failing it.

use crate::cache::CarId;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CarStatus {
    pub car_id: CarId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub software_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usable_battery_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_limit_soc: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charger_power: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ideal_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub est_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rated_range: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odometer: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inside_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outside_temp: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_climate_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_preconditioning: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugged_in: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_charging_start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence: Option<String>,
}

struct Metrics<'a>(&'a HashMap<String, String>);

impl Metrics<'_> {
    fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).filter(|value| !value.is_empty()).cloned()
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.0.get(key)?.trim().parse().ok()
    }
}

impl CarStatus {
    pub fn from_metrics(car_id: CarId, metrics: &HashMap<String, String>) -> Self {
        let m = Metrics(metrics);
        Self {
            car_id,
            name: m.text("display_name"),
            model: m.text("model"),
            state: m.text("state"),
            since: m.text("since"),
            healthy: m.parsed("healthy"),
            software_version: m.text("version"),
            update_available: m.parsed("update_available"),
            battery_level: m.parsed("battery_level"),
            usable_battery_level: m.parsed("usable_battery_level"),
            charge_limit_soc: m.parsed("charge_limit_soc"),
            charger_power: m.parsed("charger_power"),
            ideal_range: m.parsed("ideal_battery_range_km"),
            est_range: m.parsed("est_battery_range_km"),
            rated_range: m.parsed("rated_battery_range_km"),
            odometer: m.parsed("odometer"),
            inside_temp: m.parsed("inside_temp"),
            outside_temp: m.parsed("outside_temp"),
            is_climate_on: m.parsed("is_climate_on"),
            is_preconditioning: m.parsed("is_preconditioning"),
            locked: m.parsed("locked"),
            sentry_mode: m.parsed("sentry_mode"),
            plugged_in: m.parsed("plugged_in"),
            scheduled_charging_start_time: m.text("scheduled_charging_start_time"),
            shift_state: m.text("shift_state"),
            speed: m.parsed("speed"),
            latitude: m.parsed("latitude"),
            longitude: m.parsed("longitude"),
            heading: m.parsed("heading"),
            geofence: m.text("geofence"),
        }
    }
}
