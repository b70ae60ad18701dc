//! Generator of scanner and parser tables from grammars with regular right
//! parts.
//!
//! The pipeline is [`syntax`] (or [`grammar::Grammar::define`]) to build the
//! productions, [`analysis`] for nullability, First and Follow sets, and
//! [`tables::construct`] to derive the readahead, readback and reduce tables.

pub mod analysis;
pub mod fsm;
pub mod grammar;
pub mod label;
pub mod relation;
pub mod syntax;
pub mod tables;
pub mod types;
pub mod util;
