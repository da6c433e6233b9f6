pub mod api;
pub mod directory;

pub use crate::domain::model::{CommandRequest, CommandResponse, Outcome, Status, Zone};
pub use crate::domain::ports::{ConfigProvider, GeoResolver, ProfileStore, ZoneStore};
pub use crate::utils::error::Result;
