use async_trait::async_trait;
use railhold_core::{
    BackendError, CreditCardInfo, PassengerGroup, RailBackend, Reservation, ScheduleCandidate, SearchQuery,
    SeatClass, SeatFlags, TrainType,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::srt_client::{SeatType, SrtClient, SrtClientFactory, SrtPassenger, SrtSearch, SrtTrain};
use crate::{parse_timestamp, CardPayload, ClientError};

/// SRT backend driving an SRT wire client
pub struct SrtBackend {
    factory: SrtClientFactory,
    client: RwLock<Arc<dyn SrtClient>>,
    logged_in: AtomicBool,
    last_search: Mutex<HashMap<String, SrtTrain>>,
}

impl SrtBackend {
    pub fn new(factory: SrtClientFactory) -> Self {
        let client = factory();
        Self {
            factory,
            client: RwLock::new(client),
            logged_in: AtomicBool::new(false),
            last_search: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn client(&self) -> Arc<dyn SrtClient> {
        self.client.read().await.clone()
    }

    fn ensure_logged_in(&self) -> Result<(), BackendError> {
        if !self.is_logged_in() {
            return Err(BackendError::NotLoggedIn);
        }
        Ok(())
    }

    fn remember(&self, trains: &[SrtTrain]) {
        if let Ok(mut cache) = self.last_search.lock() {
            *cache = trains.iter().map(|t| (t.train_number.clone(), t.clone())).collect();
        }
    }
}

fn to_candidate(train: &SrtTrain, query: &SearchQuery) -> Result<ScheduleCandidate, BackendError> {
    Ok(ScheduleCandidate {
        train_number: train.train_number.clone(),
        departure_station: query.departure_station.clone(),
        arrival_station: query.arrival_station.clone(),
        departure_time: parse_timestamp(&train.dep_date, &train.dep_time)?,
        arrival_time: parse_timestamp(&train.arr_date, &train.arr_time)?,
        train_type: TrainType::Srt,
        available_seats: 0,
        price: None,
        seats: SeatFlags::new(train.special_seat_available(), train.general_seat_available()),
    })
}

#[async_trait]
impl RailBackend for SrtBackend {
    fn train_type(&self) -> TrainType {
        TrainType::Srt
    }

    async fn login(&self, user_id: &str, password: &str) -> Result<bool, BackendError> {
        let result = self.client().await.login(user_id, password).await;
        self.logged_in.store(result.is_ok(), Ordering::SeqCst);

        match result {
            Ok(()) => {
                info!(user = %user_id, "SRT login");
                Ok(true)
            }
            Err(ClientError::InvalidCredentials) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn logout(&self) -> Result<bool, BackendError> {
        self.client().await.logout().await?;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScheduleCandidate>, BackendError> {
        self.ensure_logged_in()?;

        let search = SrtSearch {
            dep: query.departure_station.clone(),
            arr: query.arrival_station.clone(),
            date: query.date.format("%Y%m%d").to_string(),
            time: query.time.format("%H%M%S").to_string(),
            passengers: query.passengers.iter().map(SrtPassenger::from_group).collect(),
            available_only: false,
        };

        let trains = self.client().await.search_train(&search).await?;
        debug!(count = trains.len(), "SRT search returned");
        self.remember(&trains);
        trains.iter().map(|t| to_candidate(t, query)).collect()
    }

    async fn reserve(
        &self,
        schedule: &ScheduleCandidate,
        passengers: &[PassengerGroup],
        seat_class: SeatClass,
    ) -> Result<Option<Reservation>, BackendError> {
        self.ensure_logged_in()?;

        let train = self
            .last_search
            .lock()
            .ok()
            .and_then(|cache| cache.get(&schedule.train_number).cloned())
            .ok_or_else(|| {
                BackendError::Protocol(format!("train {} is not part of the latest search", schedule.train_number))
            })?;

        let seat_type = match seat_class {
            SeatClass::Special => SeatType::SpecialOnly,
            SeatClass::General => SeatType::GeneralOnly,
        };
        let passengers: Vec<SrtPassenger> = passengers.iter().map(SrtPassenger::from_group).collect();

        let reservation = self.client().await.reserve(&train, &passengers, seat_type).await?;
        Ok(reservation.map(|r| Reservation { reservation_id: r.reservation_number }))
    }

    async fn pay(&self, reservation_id: &str, card: &CreditCardInfo) -> Result<bool, BackendError> {
        self.ensure_logged_in()?;

        let client = self.client().await;
        let target = client
            .get_reservations(false)
            .await?
            .into_iter()
            .find(|r| r.reservation_number == reservation_id)
            .ok_or_else(|| BackendError::Rejected(format!("reservation {} not found", reservation_id)))?;

        Ok(client.pay_with_card(&target, &CardPayload::from_card(card)).await?)
    }

    async fn reset_session(&self) -> Result<(), BackendError> {
        if self.is_logged_in() {
            if let Err(e) = self.logout().await {
                warn!("SRT logout before reset failed: {}", e);
            }
        }

        let fresh = (self.factory)();
        let old = std::mem::replace(&mut *self.client.write().await, fresh);
        old.clear();

        self.logged_in.store(false, Ordering::SeqCst);
        self.remember(&[]);
        info!("SRT session recreated");
        Ok(())
    }
}
