pub mod carrier;
pub mod delivery;
pub mod identity;
pub mod matching;
pub mod offer;
pub mod request;
