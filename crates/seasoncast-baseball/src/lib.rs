// Baseball crate: season loading, training-row construction, park factors,
// regression models, and held-out evaluation.

pub mod attribution;
pub mod evaluation;
pub mod features;
pub mod model;
pub mod park;
pub mod seasons;
pub mod selection;
pub mod training;
