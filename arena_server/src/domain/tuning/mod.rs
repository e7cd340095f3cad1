// Gameplay tuning, kept apart from runtime/server configuration.

pub mod field;
pub mod rounds;
pub mod tank;

pub use field::FieldTuning;
