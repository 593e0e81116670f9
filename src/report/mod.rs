//! Report exporters

pub mod csv;
