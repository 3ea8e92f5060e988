pub mod finder;
pub mod orchestrator;
pub mod scoring;
