pub mod config;
pub mod geo;
pub mod physics;
pub mod routing;
pub mod session;
pub mod util;
pub mod vehicle;

pub mod web;
