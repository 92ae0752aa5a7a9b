#![doc = include_str!("../README.md")]

mod error;

pub mod decode;
pub mod packet;
pub mod table;
pub mod time;

pub use error::{Error, Result};
