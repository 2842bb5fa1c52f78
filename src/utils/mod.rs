// src/utils/mod.rs

pub mod columns;
pub mod hash;
pub mod html;
pub mod jwt;
