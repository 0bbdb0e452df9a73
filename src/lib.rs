//! Printer logbook: logs 3D-print activity by correlating uploaded G-code
//! files with outcomes observed from an external printer controller, and
//! surfaces which slicing parameters changed between consecutive prints.

pub mod config;
pub mod diff;
pub mod error;
pub mod gcode;
pub mod job;
pub mod poller;
pub mod service;
pub mod store;
pub mod web;

pub use error::LogbookError;
pub use service::Logbook;
