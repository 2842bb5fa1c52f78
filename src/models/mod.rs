// src/models/mod.rs

pub mod attempt;
pub mod question;
pub mod quiz;
pub mod ranking;
pub mod user;
