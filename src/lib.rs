//! Streaming parser for the P1 telegrams of DSMR and Belgian e-MUCS smart meters
//!
//! Bytes go into a [`TelegramParser`] in chunks of any size, complete telegrams (or errors)
//! come out through a [`TelegramListener`].

pub mod metering_p1;
pub mod models;
pub mod obis_utils;
#[cfg(feature = "reader")]
pub mod config;
#[cfg(feature = "reader")]
pub mod reader;

// Re-export common types for easier access
pub use metering_p1::{ErrorKind, ParserState, ResetHandle, TelegramError, TelegramParser};
pub use metering_p1::crc::Crc16;
pub use metering_p1::listener::{TelegramEvent, TelegramListener};
pub use metering_p1::structs::{CosemObject, RawCosem, Telegram};
pub use models::{MeterHealth, MeterStatus, TelegramReport};
pub use obis_utils::{CosemObjectFactory, ObisRegistry};
#[cfg(feature = "reader")]
pub use config::Config;
#[cfg(feature = "reader")]
pub use reader::P1Reader;
