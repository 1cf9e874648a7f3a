pub mod atomic;
pub mod coerce;
