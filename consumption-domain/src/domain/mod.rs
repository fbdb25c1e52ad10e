pub mod aggregate;
pub mod building;
pub mod reading;

pub use aggregate::{CommuneMonthlyAggregate, ReadingStats, SiteHourlyAggregate, SiteMonthlyAggregate};
pub use building::BuildingRef;
pub use reading::{CalendarFields, CleanReading, DecoratedReading, EnergyType, EnrichedReading, RawReading};
