//! HTTP route handlers

pub mod buildings;
pub mod commands;
pub mod grid;
pub mod map;
pub mod paths;
pub mod status;
