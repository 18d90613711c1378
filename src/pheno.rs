//! Cross-species phenotype matching and scoring of gene models.

pub mod lookup;
pub mod matcher;
pub mod model;
pub mod query;
pub mod score;
pub mod scorer;
pub mod service;
pub mod term;
