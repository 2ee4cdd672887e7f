//! Vocabulary of the SRT wire client, declared for the SRT adapter.

use async_trait::async_trait;
use railhold_core::{PassengerGroup, PassengerKind};
use std::sync::Arc;

use crate::{CardPayload, ClientError};

/// Marker SRT puts in a seat state when seats can be booked
pub const SEAT_AVAILABLE_MARK: &str = "예약가능";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SrtPassenger {
    Adult(u32),
    Child(u32),
    Senior(u32),
}

impl SrtPassenger {
    pub fn from_group(group: &PassengerGroup) -> Self {
        match group.kind {
            PassengerKind::Adult => SrtPassenger::Adult(group.count),
            PassengerKind::Child => SrtPassenger::Child(group.count),
            PassengerKind::Senior => SrtPassenger::Senior(group.count),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatType {
    GeneralOnly,
    SpecialOnly,
}

#[derive(Debug, Clone)]
pub struct SrtSearch {
    pub dep: String,
    pub arr: String,
    pub date: String,
    pub time: String,
    pub passengers: Vec<SrtPassenger>,
    pub available_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtTrain {
    pub train_number: String,
    pub dep_station_name: String,
    pub arr_station_name: String,
    pub dep_date: String,
    pub dep_time: String,
    pub arr_date: String,
    pub arr_time: String,
    pub general_seat_state: String,
    pub special_seat_state: String,
}

impl SrtTrain {
    pub fn general_seat_available(&self) -> bool {
        self.general_seat_state.contains(SEAT_AVAILABLE_MARK)
    }

    pub fn special_seat_available(&self) -> bool {
        self.special_seat_state.contains(SEAT_AVAILABLE_MARK)
    }

    pub fn seat_available(&self) -> bool {
        self.general_seat_available() || self.special_seat_available()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrtReservation {
    pub reservation_number: String,
    pub train_number: String,
    pub total_cost: u32,
    pub paid: bool,
}

#[async_trait]
pub trait SrtClient: Send + Sync {
    /// Fails with `ClientError::InvalidCredentials` on a refused login
    async fn login(&self, srt_id: &str, password: &str) -> Result<(), ClientError>;

    async fn logout(&self) -> Result<(), ClientError>;

    async fn search_train(&self, search: &SrtSearch) -> Result<Vec<SrtTrain>, ClientError>;

    async fn reserve(
        &self,
        train: &SrtTrain,
        passengers: &[SrtPassenger],
        seat_type: SeatType,
    ) -> Result<Option<SrtReservation>, ClientError>;

    async fn get_reservations(&self, paid_only: bool) -> Result<Vec<SrtReservation>, ClientError>;

    async fn pay_with_card(&self, reservation: &SrtReservation, card: &CardPayload) -> Result<bool, ClientError>;

    /// Drop cookies and any other transport state
    fn clear(&self);
}

pub type SrtClientFactory = Arc<dyn Fn() -> Arc<dyn SrtClient> + Send + Sync>;
