// Interview engine: question source, conductor state machine, evaluator,
// and the registry that keeps concurrent sessions isolated.
// All digital twin calls go through answer_client.

pub mod conductor;
pub mod evaluator;
pub mod handlers;
pub mod models;
pub mod questions;
pub mod registry;
