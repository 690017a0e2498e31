//! Background services

pub mod supervisor;

pub use supervisor::{
    ReconcileReport, RequiredSubscription, SubscriptionState, SubscriptionSupervisor,
    CAMERA_CONSUMER, LEDGER_CONSUMER,
};
