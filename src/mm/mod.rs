pub mod batch;
pub mod locator;
pub mod matcher;
pub mod model;
pub mod quality;
pub mod reconstruct;
pub mod score;
pub mod stops;
pub mod traj;
pub mod trip;

pub use batch::run_trips;
pub use matcher::MapMatcher;
pub use reconstruct::reconstruct;
pub use trip::{Trip, TripState};
