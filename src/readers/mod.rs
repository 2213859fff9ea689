//! # Text readers
//!
//! * [`tle_reader`] – bulk two-line element-set files.
//! * [`cpf_reader`] – consolidated prediction format ephemerides, read as observation sets.

pub mod cpf_reader;
pub mod tle_reader;
