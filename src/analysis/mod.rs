//! Aggregation and lag-pair construction.

pub mod daily;
pub mod lag;
pub mod stats;
pub mod windows;
