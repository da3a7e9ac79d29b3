pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod job;
pub mod logger;
pub mod raster;
pub mod transform;
