//! Terminal front end: argument handling lives in `main.rs`, rendering lives here
pub mod convert;
pub mod currencies;
pub mod rates;
pub mod setup;
pub mod ui;
