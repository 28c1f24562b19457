//! Utility modules for orastat.

mod lag_parser;

pub use lag_parser::{LagParseError, parse_lag_minutes};
