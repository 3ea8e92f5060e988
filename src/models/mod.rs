pub mod business;
pub mod capability;
pub mod emergency;
pub mod intake;
pub mod matching;
pub mod volunteer;
