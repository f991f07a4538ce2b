pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod offers;
pub mod sync;

#[cfg(test)]
mod fixtures;
