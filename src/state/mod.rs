// src/state/mod.rs
//
// Declarative state shared with the host.
//
// This module holds the plain-data side of the playlist: the commands and
// notifications that make up the event bus, construction options, and the
// persisted project model. Everything here is serializable or cheaply
// cloneable; none of it touches audio.

mod archive;
mod command;
mod config;
mod notification;
mod project;

pub use archive::*;
pub use command::*;
pub use config::*;
pub use notification::*;
pub use project::*;
