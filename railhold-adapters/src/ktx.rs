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

use crate::korail::{
    KorailClient, KorailClientFactory, KorailPassenger, KorailSearch, KorailTrain, ReserveOption,
};
use crate::{parse_timestamp, CardPayload, ClientError};

/// KTX backend driving a Korail wire client
pub struct KtxBackend {
    factory: KorailClientFactory,
    client: RwLock<Arc<dyn KorailClient>>,
    logged_in: AtomicBool,
    // Wire-level trains of the latest search, keyed by train number
    last_search: Mutex<HashMap<String, KorailTrain>>,
}

impl KtxBackend {
    pub fn new(factory: KorailClientFactory) -> Self {
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

    async fn client(&self) -> Arc<dyn KorailClient> {
        self.client.read().await.clone()
    }

    fn ensure_logged_in(&self) -> Result<(), BackendError> {
        if self.is_logged_in() {
            Ok(())
        } else {
            Err(BackendError::NotLoggedIn)
        }
    }

    fn remember(&self, trains: &[KorailTrain]) {
        if let Ok(mut cache) = self.last_search.lock() {
            cache.clear();
            for train in trains {
                cache.insert(train.train_no.clone(), train.clone());
            }
        }
    }

    fn cached_train(&self, train_no: &str) -> Option<KorailTrain> {
        self.last_search.lock().ok().and_then(|cache| cache.get(train_no).cloned())
    }
}

fn to_candidate(train: &KorailTrain, query: &SearchQuery) -> Result<ScheduleCandidate, BackendError> {
    Ok(ScheduleCandidate {
        train_number: train.train_no.clone(),
        departure_station: query.departure_station.clone(),
        arrival_station: query.arrival_station.clone(),
        departure_time: parse_timestamp(&train.dep_date, &train.dep_time)?,
        arrival_time: parse_timestamp(&train.arr_date, &train.arr_time)?,
        train_type: TrainType::Ktx,
        available_seats: train.seat_count.unwrap_or(0),
        price: train.adult_charge,
        seats: SeatFlags::new(train.has_special_seat(), train.has_general_seat()),
    })
}

fn reserve_option(seat_class: SeatClass) -> ReserveOption {
    match seat_class {
        SeatClass::Special => ReserveOption::SpecialOnly,
        SeatClass::General => ReserveOption::GeneralOnly,
    }
}

#[async_trait]
impl RailBackend for KtxBackend {
    fn train_type(&self) -> TrainType {
        TrainType::Ktx
    }

    async fn login(&self, user_id: &str, password: &str) -> Result<bool, BackendError> {
        match self.client().await.login(user_id, password).await {
            Ok(accepted) => {
                self.logged_in.store(accepted, Ordering::SeqCst);
                info!(user = %user_id, accepted, "Korail login");
                Ok(accepted)
            }
            Err(ClientError::InvalidCredentials) => {
                self.logged_in.store(false, Ordering::SeqCst);
                Ok(false)
            }
            Err(e) => {
                self.logged_in.store(false, Ordering::SeqCst);
                Err(e.into())
            }
        }
    }

    async fn logout(&self) -> Result<bool, BackendError> {
        self.client().await.logout().await?;
        self.logged_in.store(false, Ordering::SeqCst);
        Ok(true)
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScheduleCandidate>, BackendError> {
        self.ensure_logged_in()?;

        let search = KorailSearch {
            dep: query.departure_station.clone(),
            arr: query.arrival_station.clone(),
            date: query.date.format("%Y%m%d").to_string(),
            time: query.time.format("%H%M%S").to_string(),
            passengers: query.passengers.iter().map(KorailPassenger::from_group).collect(),
            include_no_seats: true,
        };

        let trains: Vec<KorailTrain> = self
            .client()
            .await
            .search_train(&search)
            .await?
            .into_iter()
            .filter(KorailTrain::is_ktx)
            .collect();

        debug!(count = trains.len(), "Korail search returned");
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

        let train = self.cached_train(&schedule.train_number).ok_or_else(|| {
            BackendError::Protocol(format!("train {} is not part of the latest search", schedule.train_number))
        })?;
        let passengers: Vec<KorailPassenger> = passengers.iter().map(KorailPassenger::from_group).collect();

        let reservation = self
            .client()
            .await
            .reserve(&train, &passengers, reserve_option(seat_class))
            .await?;

        Ok(reservation.map(|r| Reservation { reservation_id: r.rsv_id }))
    }

    async fn pay(&self, reservation_id: &str, card: &CreditCardInfo) -> Result<bool, BackendError> {
        self.ensure_logged_in()?;

        let client = self.client().await;
        let reservation = client
            .reservations(reservation_id)
            .await?
            .ok_or_else(|| BackendError::Rejected(format!("reservation {} not found", reservation_id)))?;

        Ok(client.pay_with_card(&reservation, &CardPayload::from_card(card)).await?)
    }

    async fn reset_session(&self) -> Result<(), BackendError> {
        if self.is_logged_in() {
            if let Err(e) = self.logout().await {
                warn!("Korail logout before reset failed: {}", e);
            }
        }

        *self.client.write().await = (self.factory)();
        self.logged_in.store(false, Ordering::SeqCst);
        self.remember(&[]);
        info!("Korail session recreated");
        Ok(())
    }
}
