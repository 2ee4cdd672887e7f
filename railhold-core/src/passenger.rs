use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassengerKind {
    Adult,
    Child,
    Senior,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassengerGroup {
    pub kind: PassengerKind,
    pub count: u32,
}

impl PassengerGroup {
    pub fn new(kind: PassengerKind, count: u32) -> Self {
        Self { kind, count }
    }

    pub fn adults(count: u32) -> Self {
        Self::new(PassengerKind::Adult, count)
    }
}

/// Check every group has a positive count and return the total head count.
pub fn validate_passengers(groups: &[PassengerGroup]) -> CoreResult<u32> {
    if groups.is_empty() {
        return Err(CoreError::ValidationError("at least one passenger is required".to_string()));
    }

    let mut total = 0u32;
    for group in groups {
        if group.count == 0 {
            return Err(CoreError::ValidationError(format!(
                "passenger count for {:?} must be positive",
                group.kind
            )));
        }
        total = total.saturating_add(group.count);
    }

    Ok(total)
}

/// Build groups from per-kind counts, skipping zero counts
pub fn from_counts(adult: u32, child: u32, senior: u32) -> Vec<PassengerGroup> {
    [
        (PassengerKind::Adult, adult),
        (PassengerKind::Child, child),
        (PassengerKind::Senior, senior),
    ]
    .into_iter()
    .filter(|(_, count)| *count > 0)
    .map(|(kind, count)| PassengerGroup::new(kind, count))
    .collect()
}
