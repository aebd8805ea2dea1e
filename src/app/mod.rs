pub mod browser;
pub mod remote;
pub mod router;
