//! In-memory stand-ins for the Korail and SRT wire clients.
//!
//! Trains leave every 30 minutes from the requested time. Seat states are
//! rolled on every search with the configured probabilities, so a polling run
//! against the sandbox behaves like a sold-out route that occasionally frees
//! up a seat.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use crate::korail::{
    KorailClient, KorailPassenger, KorailReservation, KorailSearch, KorailTrain, ReserveOption, SEAT_BOOKABLE,
};
use crate::srt_client::{SeatType, SrtClient, SrtPassenger, SrtReservation, SrtSearch, SrtTrain, SEAT_AVAILABLE_MARK};
use crate::{CardPayload, ClientError};

const SLOT_MINUTES: i64 = 30;
const RIDE_MINUTES: i64 = 160;

#[derive(Debug, Clone)]
pub struct SandboxTimetable {
    pub seat_probability: f64,
    pub special_seat_probability: f64,
    pub trains_per_search: u32,
    pub payments_succeed: bool,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    number: u32,
    departure: NaiveDateTime,
    arrival: NaiveDateTime,
    general: bool,
    special: bool,
}

impl SandboxTimetable {
    fn slots(&self, date: &str, time: &str) -> Result<Vec<Slot>, ClientError> {
        let date = NaiveDate::parse_from_str(date, "%Y%m%d")
            .map_err(|_| ClientError::Refused(format!("invalid date {}", date)))?;
        let time = NaiveTime::parse_from_str(time, "%H%M%S")
            .map_err(|_| ClientError::Refused(format!("invalid time {}", time)))?;

        // Round up to the next slot boundary
        let minutes = i64::from(time.hour()) * 60 + i64::from(time.minute());
        let first = (minutes + SLOT_MINUTES - 1) / SLOT_MINUTES;

        let mut rng = rand::thread_rng();
        let general_p = self.seat_probability.clamp(0.0, 1.0);
        let special_p = self.special_seat_probability.clamp(0.0, 1.0);

        let slots = (0..i64::from(self.trains_per_search))
            .map(|i| first + i)
            .filter(|slot| slot * SLOT_MINUTES < 24 * 60)
            .map(|slot| {
                let departure = date.and_time(NaiveTime::MIN) + Duration::minutes(slot * SLOT_MINUTES);
                Slot {
                    number: slot as u32,
                    departure,
                    arrival: departure + Duration::minutes(RIDE_MINUTES),
                    general: rng.gen_bool(general_p),
                    special: rng.gen_bool(special_p),
                }
            })
            .collect();

        Ok(slots)
    }

    fn accepts(&self, card: &CardPayload) -> bool {
        self.payments_succeed
            && !card.number.is_empty()
            && card.number.chars().all(|c| c.is_ascii_digit() || c == '-')
            && !card.validation_number.is_empty()
    }
}

fn split(ts: NaiveDateTime) -> (String, String) {
    (ts.format("%Y%m%d").to_string(), ts.format("%H%M%S").to_string())
}

fn accepts_login(id: &str, password: &str) -> bool {
    !id.trim().is_empty() && !password.trim().is_empty()
}

pub struct SandboxKorail {
    timetable: SandboxTimetable,
    logged_in: AtomicBool,
    next_id: AtomicU64,
    reservations: Mutex<Vec<KorailReservation>>,
}

impl SandboxKorail {
    pub fn new(timetable: SandboxTimetable) -> Self {
        Self {
            timetable,
            logged_in: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            reservations: Mutex::new(Vec::new()),
        }
    }

    fn require_login(&self) -> Result<(), ClientError> {
        if self.logged_in.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ClientError::Refused("login required".to_string()))
        }
    }
}

#[async_trait]
impl KorailClient for SandboxKorail {
    async fn login(&self, korail_id: &str, password: &str) -> Result<bool, ClientError> {
        let ok = accepts_login(korail_id, password);
        self.logged_in.store(ok, Ordering::SeqCst);
        Ok(ok)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn search_train(&self, search: &KorailSearch) -> Result<Vec<KorailTrain>, ClientError> {
        self.require_login()?;

        let trains = self
            .timetable
            .slots(&search.date, &search.time)?
            .into_iter()
            .map(|slot| {
                let (dep_date, dep_time) = split(slot.departure);
                let (arr_date, arr_time) = split(slot.arrival);
                KorailTrain {
                    train_no: format!("{:03}", 100 + slot.number),
                    train_type_name: "KTX".to_string(),
                    dep_name: search.dep.clone(),
                    arr_name: search.arr.clone(),
                    dep_date,
                    dep_time,
                    arr_date,
                    arr_time,
                    general_seat: if slot.general { SEAT_BOOKABLE } else { "13" }.to_string(),
                    special_seat: if slot.special { SEAT_BOOKABLE } else { "13" }.to_string(),
                    adult_charge: Some(59800),
                    seat_count: Some(u32::from(slot.general) + u32::from(slot.special)),
                }
            })
            .filter(|train| search.include_no_seats || train.has_seat())
            .collect();

        Ok(trains)
    }

    async fn reserve(
        &self,
        train: &KorailTrain,
        _passengers: &[KorailPassenger],
        option: ReserveOption,
    ) -> Result<Option<KorailReservation>, ClientError> {
        self.require_login()?;

        let bookable = match option {
            ReserveOption::GeneralOnly => train.has_general_seat(),
            ReserveOption::SpecialOnly => train.has_special_seat(),
        };
        if !bookable {
            return Ok(None);
        }

        let reservation = KorailReservation {
            rsv_id: format!("K{:010}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            train_no: train.train_no.clone(),
            paid: false,
        };
        if let Ok(mut list) = self.reservations.lock() {
            list.push(reservation.clone());
        }
        Ok(Some(reservation))
    }

    async fn reservations(&self, rsv_id: &str) -> Result<Option<KorailReservation>, ClientError> {
        self.require_login()?;
        let list = self
            .reservations
            .lock()
            .map_err(|_| ClientError::Malformed("reservation list poisoned".to_string()))?;
        Ok(list.iter().find(|r| r.rsv_id == rsv_id).cloned())
    }

    async fn pay_with_card(&self, reservation: &KorailReservation, card: &CardPayload) -> Result<bool, ClientError> {
        self.require_login()?;
        if !self.timetable.accepts(card) {
            return Ok(false);
        }

        let mut list = self
            .reservations
            .lock()
            .map_err(|_| ClientError::Malformed("reservation list poisoned".to_string()))?;
        match list.iter_mut().find(|r| r.rsv_id == reservation.rsv_id) {
            Some(r) => {
                r.paid = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

pub struct SandboxSrt {
    timetable: SandboxTimetable,
    logged_in: AtomicBool,
    next_id: AtomicU64,
    reservations: Mutex<Vec<SrtReservation>>,
}

impl SandboxSrt {
    pub fn new(timetable: SandboxTimetable) -> Self {
        Self {
            timetable,
            logged_in: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            reservations: Mutex::new(Vec::new()),
        }
    }

    fn require_login(&self) -> Result<(), ClientError> {
        if !self.logged_in.load(Ordering::SeqCst) {
            return Err(ClientError::Refused("login required".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SrtClient for SandboxSrt {
    async fn login(&self, srt_id: &str, password: &str) -> Result<(), ClientError> {
        if !accepts_login(srt_id, password) {
            return Err(ClientError::InvalidCredentials);
        }
        self.logged_in.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn search_train(&self, search: &SrtSearch) -> Result<Vec<SrtTrain>, ClientError> {
        self.require_login()?;

        let state = |open: bool| if open { SEAT_AVAILABLE_MARK } else { "매진" }.to_string();
        let trains = self
            .timetable
            .slots(&search.date, &search.time)?
            .into_iter()
            .map(|slot| {
                let (dep_date, dep_time) = split(slot.departure);
                let (arr_date, arr_time) = split(slot.arrival);
                SrtTrain {
                    train_number: format!("{}", 300 + slot.number),
                    dep_station_name: search.dep.clone(),
                    arr_station_name: search.arr.clone(),
                    dep_date,
                    dep_time,
                    arr_date,
                    arr_time,
                    general_seat_state: state(slot.general),
                    special_seat_state: state(slot.special),
                }
            })
            .filter(|train| !search.available_only || train.seat_available())
            .collect();

        Ok(trains)
    }

    async fn reserve(
        &self,
        train: &SrtTrain,
        passengers: &[SrtPassenger],
        seat_type: SeatType,
    ) -> Result<Option<SrtReservation>, ClientError> {
        self.require_login()?;

        let bookable = match seat_type {
            SeatType::GeneralOnly => train.general_seat_available(),
            SeatType::SpecialOnly => train.special_seat_available(),
        };
        if !bookable {
            return Ok(None);
        }

        let heads: u32 = passengers
            .iter()
            .map(|p| match p {
                SrtPassenger::Adult(n) | SrtPassenger::Child(n) | SrtPassenger::Senior(n) => *n,
            })
            .sum();
        let reservation = SrtReservation {
            reservation_number: format!("S{:010}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            train_number: train.train_number.clone(),
            total_cost: 52900 * heads,
            paid: false,
        };
        if let Ok(mut list) = self.reservations.lock() {
            list.push(reservation.clone());
        }
        Ok(Some(reservation))
    }

    async fn get_reservations(&self, paid_only: bool) -> Result<Vec<SrtReservation>, ClientError> {
        self.require_login()?;
        let list = self
            .reservations
            .lock()
            .map_err(|_| ClientError::Malformed("reservation list poisoned".to_string()))?;
        Ok(list.iter().filter(|r| !paid_only || r.paid).cloned().collect())
    }

    async fn pay_with_card(&self, reservation: &SrtReservation, card: &CardPayload) -> Result<bool, ClientError> {
        self.require_login()?;
        if !self.timetable.accepts(card) {
            return Ok(false);
        }

        let mut list = self
            .reservations
            .lock()
            .map_err(|_| ClientError::Malformed("reservation list poisoned".to_string()))?;
        let found = list
            .iter_mut()
            .find(|r| r.reservation_number == reservation.reservation_number)
            .map(|r| r.paid = true)
            .is_some();
        Ok(found)
    }

    fn clear(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
    }
}
