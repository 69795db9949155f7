pub mod activity;
pub mod binding;
pub mod tally;
