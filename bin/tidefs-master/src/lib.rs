//! tidefs Master - file namespace, replica placement and balancing
//!
//! The master hands out block assignments to clients and never sees block
//! content. A periodic [`Balancer`] moves replicas between storage nodes as
//! read traffic shifts.

pub mod balancer;
pub mod master;
pub mod service;

pub use balancer::{BalanceReport, Balancer, Direction, Enlistment};
pub use master::Master;
pub use service::{router, serve};
