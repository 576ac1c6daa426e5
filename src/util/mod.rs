pub mod cancellation;
pub mod json_extract;
pub mod rate_gate;

pub use cancellation::CancellationToken;
pub use json_extract::extract_first_json_object;
pub use rate_gate::RateGate;
