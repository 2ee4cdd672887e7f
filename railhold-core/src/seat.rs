use serde::{Deserialize, Serialize};

use crate::schedule::SeatFlags;

/// How the user wants special (premium) seats handled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatPreference {
    /// Special if available, otherwise general
    SpecialAllowed,
    /// Special or nothing
    SpecialOnly,
    /// General only, even when special is available
    #[default]
    #[serde(rename = "NONE")]
    GeneralOnly,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatClass {
    Special,
    General,
}

/// Decide which seat class to request for a train, or `None` when the train
/// has nothing the preference accepts.
pub fn resolve_seat_class(flags: SeatFlags, preference: SeatPreference) -> Option<SeatClass> {
    match preference {
        SeatPreference::SpecialOnly => flags.special.then_some(SeatClass::Special),
        SeatPreference::SpecialAllowed => {
            if flags.special {
                Some(SeatClass::Special)
            } else if flags.general {
                Some(SeatClass::General)
            } else {
                None
            }
        }
        SeatPreference::GeneralOnly => flags.general.then_some(SeatClass::General),
    }
}
