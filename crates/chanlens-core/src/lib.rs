//! Core types and transformation logic for chanlens.
//!
//! Turns scraped Telegram messages and object-detection records into a star
//! schema: staging, dimension builders, fact builders and the consistency
//! checks that gate every run. This crate has no HTTP or database
//! dependencies; storage backends implement [`warehouse::Warehouse`].

// Native `async fn` in traits; the `Send` bounds are spelled out on the
// returned futures instead.
#![allow(async_fn_in_trait)]

pub mod consistency;
pub mod dimensions;
pub mod error;
pub mod facts;
pub mod keys;
pub mod ladder;
pub mod lookup;
pub mod math;
pub mod pipeline;
pub mod raw;
pub mod staging;
pub mod warehouse;

pub use error::{Error, Result};
pub use pipeline::{MartCounts, Marts, TransformReport, transform};
pub use warehouse::Warehouse;
