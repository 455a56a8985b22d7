//! Command handlers, one module per area.
//!
//! Each handler takes the session explicitly and reports through `Output`.

pub mod cart;
pub mod quote;
pub mod wishlist;
