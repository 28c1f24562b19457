//! orastat - Oracle estate status collection and reporting library.
//!
//! This library provides the core functionality behind the `orastat` binary:
//! - inventory parsing (the oratab instance registry)
//! - database and listener probing via the Oracle command-line tools
//! - consolidated HTML report rendering

pub mod collector;
pub mod inventory;
pub mod model;
pub mod report;
pub mod util;
