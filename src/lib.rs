//! Contract patterns for JSON and XML-shaped payloads.
//!
//! A [`Pattern`](pattern::Pattern) can match a value, generate a sample
//! value, specialise itself for a row of example data, and decide whether
//! it accepts every value another pattern accepts (backward compatibility).
pub mod combinations;
pub mod config;
pub mod error;
pub mod pattern;
pub mod resolver;
pub mod result;
pub mod row;
pub mod value;

pub mod document;
pub mod cli;

pub use config::{EngineConfig, UnexpectedKeyPolicy};
pub use error::ContractError;
pub use pattern::Pattern;
pub use resolver::Resolver;
pub use result::{Failure, FailureKind, MatchResult};
pub use row::Row;
pub use value::{Node, Value};
