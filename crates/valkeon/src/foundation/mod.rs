//! Foundation module - math helpers and logging setup

pub mod logging;
pub mod math;
