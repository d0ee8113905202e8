pub mod alert;
pub mod location;
pub mod weather;
pub mod wire;
