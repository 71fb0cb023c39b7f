//! Resource commands

pub mod check;
pub mod get;
pub mod out;
