// Copyright 2025-6 Seth Pendergrass. See LICENSE.

//! Primitive types for representing library images, their containers, and
//! the attributes the export engine reconciles.

mod container;
mod image;

pub use container::*;
pub use image::*;
