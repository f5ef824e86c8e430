//! flexiflight core
//!
//! Flexible flight itinerary planning: expand a travel request into routing
//! strategies, price them through a cached provider, filter and rank the
//! resulting itineraries.

pub mod airports;
pub mod assembler;
pub mod cache;
pub mod calendar;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod fetcher;
pub mod haversine;
pub mod interpreter;
pub mod itinerary;
pub mod llm;
pub mod pipeline;
pub mod ranking;
pub mod render;
pub mod request;
pub mod serpapi;
pub mod strategy;
pub mod traits;
pub mod visa;

pub use error::{PlanError, Result};
pub use pipeline::{PlanReport, Planner};
pub use request::TravelRequest;
