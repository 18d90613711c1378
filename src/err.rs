//! Typed errors of the phenotype scoring engine.

use crate::pheno::term::Organism;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhenoError {
    /// A match was filed under a query term it does not belong to.
    #[error("match for query term {found} is filed under query term {expected}")]
    QueryTermMismatch { expected: String, found: String },
    #[error("no organism uses the ontology prefix of term {0}")]
    UnknownPrefix(String),
    #[error("term {term_id} does not belong to the ontology of {organism}")]
    OrganismMismatch { organism: Organism, term_id: String },
    #[error("no phenotype matches were loaded for organism {0}")]
    MissingMatchTable(Organism),
}
