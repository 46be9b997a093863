//! HTTP surface for featsim.

pub mod rest;

pub use rest::{configure, RestApi};
