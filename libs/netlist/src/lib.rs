//! SPICE netlist model and subcircuit extraction.
//!
//! A two-stage lexer/parser for the line-oriented SPICE dot-directive
//! format. `.model` definitions have their parameters classified (numeric
//! with SI multiplier vs. opaque string; arithmetic expressions are
//! rejected), and `.subckt` … `.ends` bodies are captured verbatim.
#![warn(missing_docs)]

pub mod anomaly;
pub mod lexer;
pub mod parser;
pub mod value;

pub use anomaly::AnomalyLog;
pub use parser::{Extracted, ModelRecord, Parser, Record, SubcircuitRecord};
pub use value::ParameterValue;
