//! `memory://` resource handlers exposed alongside the tool surface.

pub mod memory;
