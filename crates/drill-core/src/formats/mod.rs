//! # Formats
//!
//! Serialization of the stage store. Pure transformations; file I/O lives in
//! [`crate::repository`].

pub mod persistence;

pub use persistence::{
    StoreFormat, StoreHeader, store_from_bytes, store_from_json, store_to_bytes, store_to_json,
};
