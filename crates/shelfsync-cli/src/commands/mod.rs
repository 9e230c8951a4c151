pub mod clear;
pub mod daemon;
pub mod probe;
pub mod reset;
pub mod status;
pub mod sync;
