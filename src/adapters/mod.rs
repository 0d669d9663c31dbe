// Adapters layer: concrete implementations of the domain ports over HTTP.

pub mod nomis;
pub mod postgrest;

pub use nomis::NomisClient;
pub use postgrest::PostgrestStore;
