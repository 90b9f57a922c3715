//! Filesystem-backed storage for script records.
//!
//! Each script lives in its own directory under the store root:
//!
//! ```text
//! <root>/<id>/meta.json   name, description, creation time
//! <root>/<id>/script      executable source (mode 0755)
//! ```

pub mod error;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use store::ScriptStore;
