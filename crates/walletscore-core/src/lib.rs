//! # walletscore-core
//! Foundation types and traits for wallet credit scoring.

pub mod activity;
pub mod band;
pub mod constants;
pub mod error;
pub mod features;
pub mod table;
pub mod traits;

pub use band::ScoreBand;
pub use features::{FeatureColumn, FeatureVector};
pub use table::{
    BalancedRow, BalancedTable, FeatureRow, FeatureTable, LabeledRow, LabeledTable, RowOrigin,
    WalletId,
};
pub use traits::ActivitySource;
