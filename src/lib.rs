//! A framework for spatially resolved epidemic simulation
//!
//! Epimet combines two simulation paradigms for SARS-CoV-2-like diseases in
//! one crate:
//! * A compartmental meta-population model (SECIR family): spatial nodes
//!   hold age-stratified populations whose infection dynamics follow a
//!   system of ordinary differential equations; nodes are connected by a
//!   mobility graph along which fractions of compartments commute and
//!   return.
//! * An agent-based model: individual agents move between typed locations
//!   (home, school, work, hospital, ...), acquire and transmit infection
//!   through local contacts, and are subject to testing and quarantine
//!   policies.
//!
//! Both feed the Monte Carlo parameter study driver, which repeatedly
//! samples uncertain parameters, simulates, and emits time-series
//! ensembles.
//!
//! Non-pharmaceutical interventions are modeled as dampings on the
//! time-dependent contact matrices; dynamic NPIs trigger automatically when
//! a monitored incidence exceeds configured thresholds. The scenario binary
//! builds a county graph from input data and runs a full ensemble study;
//! see the `scenario` binary and the [`io`] module for the expected data
//! layout.

pub mod abm;
pub mod age;
pub mod contact;
pub mod date;
pub mod dynamic_npi;
pub mod error;
pub mod graph;
pub mod integrator;
pub mod io;
pub mod numeric;
pub mod populations;
pub mod random;
pub mod secir;
pub mod secirvvs;
pub mod simulation;
pub mod study;
pub mod time;
pub mod time_series;
pub mod uncertain;

pub use error::EpiError;

pub mod log;
pub use crate::log::{
    debug, disable_logging, enable_logging, error, info, remove_module_filter, set_log_level,
    set_module_filter, set_module_filters, trace, warn, LevelFilter,
};

// Re-export for downstream model crates.
pub use nalgebra;
pub use rand;

pub mod prelude {
    pub use crate::age::AgeGroup;
    pub use crate::contact::{
        ContactMatrix, ContactMatrixGroup, Damping, DampingLevel, DampingSampling, DampingType,
        UncertainContactMatrix,
    };
    pub use crate::date::Date;
    pub use crate::dynamic_npi::DynamicNPIs;
    pub use crate::error::EpiError;
    pub use crate::graph::{Graph, GraphSimulation, MobilityParameters};
    pub use crate::populations::Populations;
    pub use crate::simulation::{EpiModel, Simulation};
    pub use crate::study::ParameterStudy;
    pub use crate::time::SimulationTime;
    pub use crate::time_series::TimeSeries;
    pub use crate::uncertain::{ParameterDistribution, UncertainValue};
}
