pub mod controller;
pub mod gesture;
pub mod reticle;
pub mod surface;

pub use controller::{PlacementController, PlacementPolicy, PlacementState};
pub use gesture::TouchGesture;
pub use reticle::{Reticle, ReticleStyle};
pub use surface::SurfaceEstimator;
