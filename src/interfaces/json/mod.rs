pub mod response;
pub mod seed;
pub mod trigger;
