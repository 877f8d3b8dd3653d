// Application crate: orchestration, artifact publishing, and the read surface
// used by the `seasoncast` binary.

pub mod pipeline;
pub mod publish;
pub mod query;
