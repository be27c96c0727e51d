//! Integration tests: canned Odds API responses driven through the
//! full scan → store → dashboard path.

mod fake_api;
mod pipeline;
