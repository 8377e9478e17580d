//! Wire representations of the hardware catalog.
//!
//! - [`catalog`]: a snapshot of every table used to assemble nested views
//! - [`views`]: flat and nested read shapes with display strings
//! - [`resources`]: the REST collections and their filters
//! - [`page`]: the paginated list envelope
//! - [`payload`]: decoding of write payloads

pub mod catalog;
pub mod page;
pub mod payload;
pub mod resources;
pub mod views;

pub use catalog::{Catalog, Rows};
pub use page::{Page, Window};
pub use payload::{decode_fields, merge_patch, parse_body};
pub use resources::Resource;
pub use views::*;
