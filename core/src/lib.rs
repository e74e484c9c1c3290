#![no_std]

pub mod application;
pub mod catalog;
pub mod fs;
pub mod image_loader;
pub mod input;
pub mod navigation;
pub mod power;
pub mod store;

#[cfg(test)]
pub(crate) mod testkit;
