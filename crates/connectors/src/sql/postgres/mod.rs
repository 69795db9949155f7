pub mod params;
pub mod query;
pub mod session;
pub mod utils;
