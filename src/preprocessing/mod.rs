//! Data preparation module
//!
//! Turns a raw table into scaled train/test matrices:
//! - Identifier column removal
//! - Ordinal encoding of categorical columns
//! - Derived ratio features
//! - Stratified train/test split
//! - Standard scaling fit on the training partition

mod config;
mod encoder;
mod preparer;
mod scaler;
mod split;

pub use config::{DataConfig, DerivedFeature, SplitConfig};
pub use encoder::{CategoryEncoder, UNSEEN_CODE};
pub use preparer::{DataPreparer, PreparedData};
pub use scaler::StandardScaler;
pub use split::stratified_train_test_split;
