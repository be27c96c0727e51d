//! Scan engine: the fetch → normalize → evaluate → publish loop.

pub mod scanner;
pub mod worker;
