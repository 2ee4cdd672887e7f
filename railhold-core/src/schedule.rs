use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainType {
    Ktx,
    Srt,
}

impl TrainType {
    pub const ALL: [TrainType; 2] = [TrainType::Ktx, TrainType::Srt];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrainType::Ktx => "KTX",
            TrainType::Srt => "SRT",
        }
    }

    /// Parse the lower- or upper-case backend name used in paths and config
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "KTX" | "KORAIL" => Some(TrainType::Ktx),
            "SRT" => Some(TrainType::Srt),
            _ => None,
        }
    }
}

impl fmt::Display for TrainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seat inventory flags reported by the backend for one train
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatFlags {
    pub special: bool,
    pub general: bool,
}

impl SeatFlags {
    pub fn new(special: bool, general: bool) -> Self {
        Self { special, general }
    }

    pub fn any(&self) -> bool {
        self.special || self.general
    }
}

/// One train schedule as returned by a search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduleCandidate {
    pub train_number: String,
    pub departure_station: String,
    pub arrival_station: String,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub train_type: TrainType,
    pub available_seats: u32,
    pub price: Option<u32>,
    #[serde(default)]
    pub seats: SeatFlags,
}

impl ScheduleCandidate {
    /// Preference order: earlier departure first, train number breaks ties
    pub fn preference_cmp(&self, other: &Self) -> Ordering {
        self.departure_time
            .cmp(&other.departure_time)
            .then_with(|| self.train_number.cmp(&other.train_number))
    }
}

/// Stable sort by departure time, then train number
pub fn sort_by_departure(candidates: &mut [ScheduleCandidate]) {
    candidates.sort_by(|a, b| a.preference_cmp(b));
}
