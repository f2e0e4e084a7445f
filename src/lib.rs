pub mod analysis;
pub mod calibration;
pub mod config;
pub mod error;
pub mod pose;
pub mod profile;
pub mod report;
