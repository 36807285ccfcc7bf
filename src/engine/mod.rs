pub mod auto_accept;
pub mod clock;
pub mod events;
pub mod matching;
pub mod offers;
pub mod requests;
pub mod scoring;
pub mod sweeper;
