// folio-common: shared types and utilities for the Folio workspace

pub mod diff;
pub mod fingerprint;
pub mod path;
pub mod protocol;
