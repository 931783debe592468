// Text diffing: Myers edit scripts and the serialized patch format that the
// sync protocol sends over the wire.

pub mod myers;
pub mod patch;

pub use patch::{HunkOutcome, PatchApplication, PatchError, TextPatch};
