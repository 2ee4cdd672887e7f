//! Vocabulary of the Korail wire client. The client itself (login handshake,
//! response scraping, station codes) lives outside this workspace; only the
//! surface the KTX adapter drives is declared here.

use async_trait::async_trait;
use railhold_core::{PassengerGroup, PassengerKind};
use std::sync::Arc;

use crate::{CardPayload, ClientError};

/// Seat state code Korail uses for "bookable"
pub const SEAT_BOOKABLE: &str = "11";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KorailPassenger {
    Adult(u32),
    Child(u32),
    Senior(u32),
}

impl KorailPassenger {
    pub fn from_group(group: &PassengerGroup) -> Self {
        match group.kind {
            PassengerKind::Adult => KorailPassenger::Adult(group.count),
            PassengerKind::Child => KorailPassenger::Child(group.count),
            PassengerKind::Senior => KorailPassenger::Senior(group.count),
        }
    }

    pub fn count(&self) -> u32 {
        match self {
            KorailPassenger::Adult(n) | KorailPassenger::Child(n) | KorailPassenger::Senior(n) => *n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOption {
    GeneralOnly,
    SpecialOnly,
}

#[derive(Debug, Clone)]
pub struct KorailSearch {
    pub dep: String,
    pub arr: String,
    /// YYYYMMDD
    pub date: String,
    /// HHMMSS
    pub time: String,
    pub passengers: Vec<KorailPassenger>,
    pub include_no_seats: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KorailTrain {
    pub train_no: String,
    pub train_type_name: String,
    pub dep_name: String,
    pub arr_name: String,
    pub dep_date: String,
    pub dep_time: String,
    pub arr_date: String,
    pub arr_time: String,
    pub general_seat: String,
    pub special_seat: String,
    pub adult_charge: Option<u32>,
    pub seat_count: Option<u32>,
}

impl KorailTrain {
    pub fn has_general_seat(&self) -> bool {
        self.general_seat == SEAT_BOOKABLE
    }

    pub fn has_special_seat(&self) -> bool {
        self.special_seat == SEAT_BOOKABLE
    }

    pub fn has_seat(&self) -> bool {
        self.has_general_seat() || self.has_special_seat()
    }

    pub fn is_ktx(&self) -> bool {
        self.train_type_name.to_ascii_uppercase().contains("KTX")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KorailReservation {
    pub rsv_id: String,
    pub train_no: String,
    pub paid: bool,
}

#[async_trait]
pub trait KorailClient: Send + Sync {
    async fn login(&self, korail_id: &str, password: &str) -> Result<bool, ClientError>;

    async fn logout(&self) -> Result<(), ClientError>;

    async fn search_train(&self, search: &KorailSearch) -> Result<Vec<KorailTrain>, ClientError>;

    /// `Ok(None)` when the seats sold out between search and reserve
    async fn reserve(
        &self,
        train: &KorailTrain,
        passengers: &[KorailPassenger],
        option: ReserveOption,
    ) -> Result<Option<KorailReservation>, ClientError>;

    async fn reservations(&self, rsv_id: &str) -> Result<Option<KorailReservation>, ClientError>;

    async fn pay_with_card(&self, reservation: &KorailReservation, card: &CardPayload) -> Result<bool, ClientError>;
}

/// Creates a fresh, logged-out client; called again on every session reset
pub type KorailClientFactory = Arc<dyn Fn() -> Arc<dyn KorailClient> + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passenger_mapping() {
        let groups = railhold_core::passenger::from_counts(2, 1, 3);
        let mapped: Vec<KorailPassenger> = groups.iter().map(KorailPassenger::from_group).collect();
        assert_eq!(
            mapped,
            vec![KorailPassenger::Adult(2), KorailPassenger::Child(1), KorailPassenger::Senior(3)]
        );
        assert_eq!(mapped.iter().map(KorailPassenger::count).sum::<u32>(), 6);
    }

    #[test]
    fn test_seat_codes() {
        let train = KorailTrain {
            train_no: "101".to_string(),
            train_type_name: "KTX-산천".to_string(),
            dep_name: "서울".to_string(),
            arr_name: "부산".to_string(),
            dep_date: "20261020".to_string(),
            dep_time: "090000".to_string(),
            arr_date: "20261020".to_string(),
            arr_time: "114000".to_string(),
            general_seat: "13".to_string(),
            special_seat: SEAT_BOOKABLE.to_string(),
            adult_charge: Some(59800),
            seat_count: None,
        };
        assert!(!train.has_general_seat());
        assert!(train.has_special_seat());
        assert!(train.has_seat());
        assert!(train.is_ktx());
    }
}
