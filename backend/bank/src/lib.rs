//! # Bank
//!
//! Storage records for the recipe store, kept as a single protobuf message.
//!
//! ## Layout
//! - Recipes, each tagged with the category option ids it belongs to
//! - Category groups in display order, each owning its options
//! - Cooking logs, one record per completed cook
//! - Profiles and favorites
//!
//! ## Notes
//! - The server loads the whole bank in memory at startup, either from
//!   [`BANK_PATH`] or from a remote URL.
//! - The `process` binary builds the file from a JSON seed.
use std::{fs, path::Path};

use anyhow::{Context, Error};
use prost::Message;

pub mod records;
pub mod remote;

pub use records::{
    Bank, CategoryGroupRecord, CategoryOptionRecord, CookingLog, Favorite, Profile, Recipe,
};
pub use remote::get_remote_bank;

pub const BANK_PATH: &str = "../bank.bin";

pub fn get_bank(path: impl AsRef<Path>) -> Result<Bank, Error> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("Failed to read bank at {}", path.display()))?;

    Bank::decode(&*data).with_context(|| format!("Malformed bank at {}", path.display()))
}

pub fn write_bank(path: impl AsRef<Path>, bank: &Bank) -> Result<(), Error> {
    let path = path.as_ref();

    fs::write(path, bank.encode_to_vec())
        .with_context(|| format!("Failed to write bank at {}", path.display()))
}
