#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::default_trait_access)]

//! This is a general purpose discrete-event core that provides a time-ordered pending-event set
//! and the simulation clock. It knows nothing about the events it stores: the caller pops them
//! one at a time and executes them however it sees fit.

pub use scheduler::{EventEntry, EventId, Scheduler};

mod scheduler;
