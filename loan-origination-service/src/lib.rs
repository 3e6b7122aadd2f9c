pub mod collaborators;
pub mod extract;
pub mod markers;
pub mod orchestrator;
pub mod recovery;
pub mod steps;
pub mod underwriting;

pub use orchestrator::{Collaborators, DialogueOrchestrator};
pub use steps::Step;
