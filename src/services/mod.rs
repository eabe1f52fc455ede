pub mod inventory;
pub mod orders;
pub mod promo;
pub mod reconciler;
pub mod sweeper;
pub mod tickets;
