//! Core logic for a gamified personal-development app.
//!
//! Two independent pieces, both reductions over external data sources:
//! daily-quote rotation (no repeats until the catalog is exhausted, then a
//! cycle reset) and per-room presence aggregation over a realtime
//! transport. Plus the supporting glue: settings, translation lookup, and
//! logging setup.

mod error;
mod logging;
mod presence;
mod quote;
mod room;
mod rotation;
mod settings;
mod store;
mod translate;

pub use error::CoreError;
pub use logging::init_logging;
pub use presence::{ConnectionState, PresenceAggregator, PresenceEvent, PresenceRecord};
pub use quote::{Quote, QuoteId, SeenRecord};
pub use room::{
    subscribe_to_room, InMemoryRoomTransport, PresenceHandle, RoomChannel, RoomEvent,
    RoomTransport, Subscription,
};
pub use rotation::QuoteRotation;
pub use settings::Settings;
pub use store::{InMemoryQuoteStore, QuoteStore};
pub use translate::Translator;
