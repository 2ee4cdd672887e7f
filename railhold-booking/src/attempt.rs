use railhold_core::schedule::sort_by_departure;
use railhold_core::{
    resolve_seat_class, RailBackend, ReservationOutcome, ReservationRequest, ScheduleCandidate, SearchQuery,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NO_SEATS_MESSAGE: &str = "no seats available among requested trains";

/// One reservation pass over the user's selected trains.
///
/// The selection is ordered by departure time, the backend is re-queried for
/// live availability, and the first train whose seats the preference accepts
/// is reserved. Backend failures end the pass as a lost attempt.
pub struct AttemptEngine {
    backend: Arc<dyn RailBackend>,
}

impl AttemptEngine {
    pub fn new(backend: Arc<dyn RailBackend>) -> Self {
        Self { backend }
    }

    pub async fn attempt(&self, selected: &[ScheduleCandidate], request: &ReservationRequest) -> ReservationOutcome {
        let mut ordered = selected.to_vec();
        sort_by_departure(&mut ordered);

        let live = match self.backend.search(&SearchQuery::from_request(request)).await {
            Ok(live) => live,
            Err(e) => {
                warn!(backend = %self.backend.train_type(), "Live search failed: {}", e);
                return ReservationOutcome::lost(e.to_string());
            }
        };

        let mut by_number: HashMap<&str, &ScheduleCandidate> = HashMap::new();
        for schedule in &live {
            by_number.entry(schedule.train_number.as_str()).or_insert(schedule);
        }

        let mut tried = HashSet::new();
        for wanted in &ordered {
            if !tried.insert(wanted.train_number.as_str()) {
                continue;
            }
            let Some(schedule) = by_number.get(wanted.train_number.as_str()) else {
                debug!(train = %wanted.train_number, "Not in live results");
                continue;
            };

            let flags = self.backend.seat_flags(schedule);
            let Some(seat_class) = resolve_seat_class(flags, request.seat_preference) else {
                debug!(train = %schedule.train_number, ?flags, "No acceptable seat");
                continue;
            };

            match self.backend.reserve(schedule, &request.passengers, seat_class).await {
                Ok(Some(reservation)) => {
                    info!(
                        train = %schedule.train_number,
                        reservation = %reservation.reservation_id,
                        ?seat_class,
                        "Reserved"
                    );
                    return ReservationOutcome::won(reservation.reservation_id, (*schedule).clone());
                }
                // Sold out between search and reserve
                Ok(None) => {
                    debug!(train = %schedule.train_number, "Seat taken before reserve");
                }
                Err(e) => {
                    warn!(train = %schedule.train_number, "Reserve failed: {}", e);
                    return ReservationOutcome::lost(e.to_string());
                }
            }
        }

        ReservationOutcome::lost(NO_SEATS_MESSAGE)
    }
}
