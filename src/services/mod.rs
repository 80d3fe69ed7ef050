pub mod catalog;
pub mod notifications;
pub mod reservations;
pub mod slots;
