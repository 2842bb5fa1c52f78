// src/services/mod.rs

//! Pure quiz logic: scoring, ranking aggregation and question ordering.
//! Nothing in here touches the database.

pub mod ranking;
pub mod scoring;
pub mod shuffle;
