//! Data models for the flashcards application.
//!
//! Field names match the JSON contract of the client-side UI.

mod card;
mod topic;
mod user;

pub use card::*;
pub use topic::*;
pub use user::*;

use serde::{Deserialize, Deserializer};

/// Deserialize a field that distinguishes "absent" (`None`) from an explicit
/// `null` (`Some(None)`). Use together with `#[serde(default)]`.
pub fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
