//! Geocoding pipeline subsystem.
//!
//! Query generation, provider backends, the four-stage resolver, and
//! the JSON snapshot store.

pub mod providers;
pub mod queries;
pub mod resolver;
pub mod store;
pub mod types;

pub use providers::{
    BasicLookup, EnhancedLookup, Fix, GeocodeBackend, LookupStage, NominatimBackend,
    OpenCageBackend, OpenCageLookup, PhotonBackend, PhotonLookup,
};
pub use queries::{basic_query, variant_queries, PlaceKeyword, PLACE_KEYWORDS};
pub use resolver::GeocodeResolver;
pub use store::{ResultStore, Summary};
pub use types::{
    Coordinate, GeocodeConfig, GeocodeError, LocationRecord, PlaceContext, Stage, StageResult,
};
