pub mod analysis;
pub mod calibration;
pub mod config;
pub mod consts;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod io;
pub mod progress;
pub mod project;
pub mod record;
pub mod session;
pub mod stack;
pub mod store;
