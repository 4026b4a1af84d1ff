//! katalog: a small library catalogue service.
//!
//! Books are keyed by a six-digit serial number and move between
//! available and borrowed. [`records::BookRecords`] owns those transitions,
//! [`validation`] guards its inputs and [`routes::app`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod model;
pub mod records;
pub mod routes;
pub mod validation;
