pub mod catalog;
pub mod customer;
pub mod order;
pub mod session;
