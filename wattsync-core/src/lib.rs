//! WATTSYNC Core - Data Types for the Synchronization Client
//!
//! This crate defines the plain data types shared by the synchronization
//! client and its tests: device/alert/tariff/space records, resource keys,
//! and realtime change events. It performs no I/O.
//!
//! # Key Types
//!
//! - [`DeviceStatusReading`]: the latest known status of one device
//! - [`Alert`]: an alert row as delivered by the backend
//! - [`Tariff`] / [`Space`]: ancillary dashboard resources
//! - [`ResourceKey`]: identifier scoping a fetch or subscription to one
//!   logical resource
//! - [`ChangeEvent`] / [`EventFilter`]: realtime change notifications and
//!   the filters applied to them

mod alert;
mod change;
mod device;
mod key;
mod space;
mod tariff;

pub use alert::{Alert, AlertSeverity};
pub use change::{ChangeEvent, ChangeKind, EventFilter};
pub use device::{DeviceId, DeviceState, DeviceStatusReading};
pub use key::ResourceKey;
pub use space::Space;
pub use tariff::Tariff;
