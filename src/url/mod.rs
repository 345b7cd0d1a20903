//! URL helpers for turning portal links into local file system names
//!
//! Every name that reaches the file system goes through the same pipeline:
//! take the last path segment, percent-decode it, then sanitise it into a
//! single safe path component.

mod filename;

pub use filename::{
    decode_component, extension_of, file_name_from_location, file_name_from_url,
    sanitize_component,
};
