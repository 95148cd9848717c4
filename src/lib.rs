//! Parse tabletop dice notation, roll it, and compare empirical statistics
//! against exact probability distributions.
//!
//! The core is two pieces used in sequence: [`parser::parse`] turns a
//! notation string like `"2d8 + 1d4 - 3"` into an [`Expression`], and
//! [`evaluate`] samples that expression and derives a
//! [`StatisticsSummary`]. [`Distribution`] computes the exact probability
//! distribution of an expression without any sampling.
//!
//! ```
//! use dice_average::{evaluate, parser::parse};
//!
//! let expr = parse("3d6 + 2").unwrap();
//! assert_eq!(expr.theoretical_mean(), 12.5);
//!
//! let (records, summary) = evaluate(&expr, 1000, Some(42)).unwrap();
//! assert_eq!(records.len(), 1000);
//! assert!(summary.min >= 5 && summary.max <= 20);
//! ```
//!
//! Seeded evaluations pin the ChaCha8 generator, so the same seed,
//! expression and iteration count reproduce identical rolls across runs.

pub mod config;
pub mod display;
pub mod distribution;
pub mod error;
pub mod expression;
pub mod history;
pub mod parser;
pub mod roller;
pub mod stats;

pub use config::{AppConfig, ConfigStore, OutputFormat};
pub use distribution::{Distribution, Prob, MAX_CONVOLUTION_WORK};
pub use error::Error;
pub use expression::{
    AggrValue, ConstantTerm, DiceTerm, Expression, ExpressionInfo, Sign, Term, Value, MAX_COUNT,
    MAX_SIDES,
};
pub use history::{HistoryStore, RollHistory, RollSession};
pub use parser::{parse, ParseError};
pub use roller::{evaluate, roll_once_with, RollRecord, Roller, MAX_FACE_DRAWS};
pub use stats::{Frequency, StatisticsSummary};
