use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::passenger::{validate_passengers, PassengerGroup};
use crate::schedule::TrainType;
use crate::seat::SeatPreference;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationRequest {
    pub departure_station: String,
    pub arrival_station: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub passengers: Vec<PassengerGroup>,
    pub train_type: TrainType,
    #[serde(default)]
    pub seat_preference: SeatPreference,
}

impl ReservationRequest {
    pub fn validate(&self) -> CoreResult<()> {
        let dep = self.departure_station.trim();
        let arr = self.arrival_station.trim();

        if dep.is_empty() || arr.is_empty() {
            return Err(CoreError::ValidationError(
                "departure and arrival stations are required".to_string(),
            ));
        }
        if dep == arr {
            return Err(CoreError::ValidationError(format!(
                "departure and arrival stations must differ ({})",
                dep
            )));
        }

        validate_passengers(&self.passengers)?;
        Ok(())
    }
}

/// Parse a departure date typed as `YYYYMMDD` or `YYYY-MM-DD`
pub fn parse_departure_date(value: &str) -> CoreResult<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| CoreError::ValidationError(format!("malformed departure date: {:?}", value)))
}

/// Parse a departure time typed as `HHMM` or `HHMMSS`
pub fn parse_departure_time(value: &str) -> CoreResult<NaiveTime> {
    let value = value.trim();
    let parsed = match value.len() {
        4 => NaiveTime::parse_from_str(value, "%H%M"),
        6 => NaiveTime::parse_from_str(value, "%H%M%S"),
        _ => NaiveTime::parse_from_str(value, "%H:%M"),
    };
    parsed.map_err(|_| CoreError::ValidationError(format!("malformed departure time: {:?}", value)))
}
