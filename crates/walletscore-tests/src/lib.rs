//! Cross-crate scenario tests for walletscore.
//!
//! Integration tests live in `tests/`; [`helpers`] builds the wallet
//! populations and activity fixtures they share.

pub mod helpers;
