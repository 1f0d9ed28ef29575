//! Analysis layer: the closed table of analysis units, the remote analysis
//! service client, the concurrent fan-out executor, and the result validator
//! that gates what may reach storage.

mod client;
mod error;
pub mod executor;
pub mod schema;
pub mod units;
pub mod validator;

pub use client::AnalysisClient;
pub use error::{AnalysisError, ValidationError};
pub use executor::{run_units, UnitRetry};
pub use units::{registered_units, UnitSpec};
pub use validator::validate;
