//! Core types and traits for the site content core.
//!
//! Field names serialise in camelCase so stored blobs keep the layout the admin
//! panel has always written.

mod action_log;
mod asset;
mod auth;
mod clock;
pub mod keys;
mod section;
mod traits;

pub use action_log::*;
pub use asset::*;
pub use auth::*;
pub use clock::*;
pub use section::*;
pub use traits::*;
