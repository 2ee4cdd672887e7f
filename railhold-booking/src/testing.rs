//! Scripted rail backend used by the booking tests.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use railhold_core::{
    BackendError, CreditCardInfo, PassengerGroup, RailBackend, Reservation, ReservationRequest, ScheduleCandidate,
    SearchQuery, SeatClass, SeatFlags, SeatPreference, TrainType,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login,
    Logout,
    Search,
    Reserve(String, SeatClass),
    Pay(String),
    Reset,
}

type SearchScript = Box<dyn Fn(u64) -> Result<Vec<ScheduleCandidate>, BackendError> + Send + Sync>;
type ReserveScript = Box<dyn Fn(&ScheduleCandidate, SeatClass) -> Result<Option<Reservation>, BackendError> + Send + Sync>;
type LoginScript = Box<dyn Fn(u64) -> Result<bool, BackendError> + Send + Sync>;

pub struct ScriptedBackend {
    train_type: TrainType,
    calls: Mutex<Vec<(Call, Instant)>>,
    searches: AtomicU64,
    logins: AtomicU64,
    search: SearchScript,
    reserve: ReserveScript,
    login: LoginScript,
    pay: Mutex<Result<bool, BackendError>>,
    pay_delay: Duration,
}

impl ScriptedBackend {
    /// Searches return nothing, reserves succeed, logins and payments pass
    pub fn new(train_type: TrainType) -> Self {
        Self {
            train_type,
            calls: Mutex::new(Vec::new()),
            searches: AtomicU64::new(0),
            logins: AtomicU64::new(0),
            search: Box::new(|_| Ok(Vec::new())),
            reserve: Box::new(|schedule, _| {
                Ok(Some(Reservation {
                    reservation_id: format!("R-{}", schedule.train_number),
                }))
            }),
            login: Box::new(|_| Ok(true)),
            pay: Mutex::new(Ok(true)),
            pay_delay: Duration::ZERO,
        }
    }

    /// The closure gets the 1-based search number
    pub fn with_search<F>(mut self, script: F) -> Self
    where
        F: Fn(u64) -> Result<Vec<ScheduleCandidate>, BackendError> + Send + Sync + 'static,
    {
        self.search = Box::new(script);
        self
    }

    /// Every search returns the same trains
    pub fn with_trains(self, trains: Vec<ScheduleCandidate>) -> Self {
        self.with_search(move |_| Ok(trains.clone()))
    }

    pub fn with_reserve<F>(mut self, script: F) -> Self
    where
        F: Fn(&ScheduleCandidate, SeatClass) -> Result<Option<Reservation>, BackendError> + Send + Sync + 'static,
    {
        self.reserve = Box::new(script);
        self
    }

    /// The closure gets the 1-based login number
    pub fn with_login<F>(mut self, script: F) -> Self
    where
        F: Fn(u64) -> Result<bool, BackendError> + Send + Sync + 'static,
    {
        self.login = Box::new(script);
        self
    }

    pub fn with_pay(self, result: Result<bool, BackendError>) -> Self {
        *self.pay.lock().unwrap() = result;
        self
    }

    /// `pay` answers only after `delay`
    pub fn with_pay_delay(mut self, delay: Duration) -> Self {
        self.pay_delay = delay;
        self
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push((call, Instant::now()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn timed_calls(&self) -> Vec<(Call, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls().iter().filter(|c| *c == wanted).count()
    }

    pub fn reserve_calls(&self) -> Vec<(String, SeatClass)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Reserve(train, class) => Some((train, class)),
                _ => None,
            })
            .collect()
    }

    pub fn pay_calls(&self) -> usize {
        self.calls().iter().filter(|c| matches!(c, Call::Pay(_))).count()
    }
}

#[async_trait]
impl RailBackend for ScriptedBackend {
    fn train_type(&self) -> TrainType {
        self.train_type
    }

    async fn login(&self, _user_id: &str, _password: &str) -> Result<bool, BackendError> {
        self.log(Call::Login);
        let n = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        (self.login)(n)
    }

    async fn logout(&self) -> Result<bool, BackendError> {
        self.log(Call::Logout);
        Ok(true)
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<ScheduleCandidate>, BackendError> {
        self.log(Call::Search);
        let n = self.searches.fetch_add(1, Ordering::SeqCst) + 1;
        (self.search)(n)
    }

    async fn reserve(
        &self,
        schedule: &ScheduleCandidate,
        _passengers: &[PassengerGroup],
        seat_class: SeatClass,
    ) -> Result<Option<Reservation>, BackendError> {
        self.log(Call::Reserve(schedule.train_number.clone(), seat_class));
        (self.reserve)(schedule, seat_class)
    }

    async fn pay(&self, reservation_id: &str, _card: &CreditCardInfo) -> Result<bool, BackendError> {
        self.log(Call::Pay(reservation_id.to_string()));
        if !self.pay_delay.is_zero() {
            tokio::time::sleep(self.pay_delay).await;
        }
        self.pay.lock().unwrap().clone()
    }

    async fn reset_session(&self) -> Result<(), BackendError> {
        self.log(Call::Reset);
        Ok(())
    }
}

pub fn departure(hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 20)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

pub fn train(number: &str, hour: u32, minute: u32, special: bool, general: bool) -> ScheduleCandidate {
    ScheduleCandidate {
        train_number: number.to_string(),
        departure_station: "서울".to_string(),
        arrival_station: "부산".to_string(),
        departure_time: departure(hour, minute),
        arrival_time: departure(hour + 2, minute),
        train_type: TrainType::Ktx,
        available_seats: u32::from(special) + u32::from(general),
        price: Some(59800),
        seats: SeatFlags::new(special, general),
    }
}

pub fn request(preference: SeatPreference) -> ReservationRequest {
    ReservationRequest {
        departure_station: "서울".to_string(),
        arrival_station: "부산".to_string(),
        departure_date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
        departure_time: departure(9, 0).time(),
        passengers: vec![PassengerGroup::adults(1)],
        train_type: TrainType::Ktx,
        seat_preference: preference,
    }
}

pub fn valid_card() -> CreditCardInfo {
    CreditCardInfo::personal("1234567812345678", "12", "2812", "900101")
}

/// Alert sink that remembers every beat
#[derive(Default)]
pub struct CountingSink {
    pub beats: Mutex<Vec<u64>>,
}

impl crate::alert::AlertSink for CountingSink {
    fn notify(&self, _alert: &railhold_shared::models::events::AlertRaisedEvent, beat: u64) {
        self.beats.lock().unwrap().push(beat);
    }
}
