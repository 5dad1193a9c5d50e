//! An event-scheduled epidemic simulation core
//!
//! Outbreak simulates an epidemic spreading through the population of a city. It is the engine
//! behind a city management game: a discrete, pausable, accelerable game clock drives a generic
//! scheduler, and every character follows a health state machine whose transitions are all
//! expressed as scheduled events.
//!
//! The central object of a simulation is the [`Context`]. It owns:
//! * The [`VirtualClock`](clock::VirtualClock): the current day, the second within the day and
//!   the speed at which simulated seconds pass
//! * The [`EventScheduler`](schedule::EventScheduler): handlers that run every day at a given
//!   second, handlers that run once at a given day and second, and broadcasts fired every
//!   second and at every day end
//! * Module-specific data, held in data plugins so that modules can reach each other's state
//!   without globals
//!
//! Everything else is a module adding behavior to the `Context` through an extension trait:
//! * `characters`: the population and the per-character health state machine
//! * `disease`: the catalog of diseases and the vaccines preventing them
//! * `transmission`: the probability model shared by zones and contacts
//! * `zone`: placed disease hotspots and the bodies of the dead
//! * `facility`: hospitals, laboratories and health centers
//! * `research`: vaccine research and dose production
//! * `economy`: the treasury billed by facilities
//! * `statistics`: daily tallies and the win/lose outcome
//! * `report`: CSV output
//! * `config` and `runner`: JSON scenarios and the command line driver
pub mod characters;
pub mod clock;
pub mod config;
pub mod context;
pub mod disease;
pub mod economy;
pub mod encounters;
pub mod error;
pub mod event;
pub mod facility;
pub mod hashing;
pub mod log;
pub mod prelude;
pub mod random;
pub mod report;
pub mod research;
pub mod runner;
pub mod schedule;
pub mod statistics;
pub mod transmission;
pub mod zone;

pub use crate::context::Context;
pub use crate::error::OutbreakError;

// Re-exported for the macros
pub use csv;
pub use paste;
pub use rand;
