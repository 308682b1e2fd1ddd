pub mod cabinet;
pub mod config;
pub mod ddragon;
pub mod m72;
pub mod region;
pub mod registry;
pub mod renegade;
pub mod shadfrce;
pub mod wwfwfest;
