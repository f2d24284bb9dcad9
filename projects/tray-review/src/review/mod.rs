pub mod capture;
pub mod counts;
pub mod detection;
pub mod export;
pub mod ledger;
pub mod notice;
pub mod playback;
pub mod resources;
pub mod session;
pub mod time;
