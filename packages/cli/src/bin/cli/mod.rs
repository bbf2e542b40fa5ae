pub mod providers;
pub mod sandbox;
pub mod utils;
