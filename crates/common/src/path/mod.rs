// Document path handling shared by client and server.

pub mod normalize;

pub use normalize::{normalize_path, DocPath, PathError};
