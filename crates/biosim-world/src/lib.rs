//! Island ecosystem engine.
//!
//! Herbivores and carnivores live on a grid of terrain cells. Every year each
//! cell runs its local pipeline and animals may then migrate to a neighbour.

pub mod animal;
pub mod cell;
pub mod island;
pub mod simulation;

pub use animal::Animal;
pub use cell::Cell;
pub use island::Island;
pub use simulation::{Simulation, SimulationObserver, Snapshot};
