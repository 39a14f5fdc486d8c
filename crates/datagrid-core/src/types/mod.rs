//! Request model and row container types.

pub mod filter;
pub mod input;
pub mod order;
pub mod row;
pub mod value;
