pub mod driver;
pub mod identity;
pub mod order;
pub mod payment;
pub mod tracking;
