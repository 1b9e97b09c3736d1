#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod error;
pub mod stomp;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub use stomp::{Client, ConnectionState, Event, Message};
pub use ws::config::{Config, ReconnectConfig};
