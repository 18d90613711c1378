//! Lookup of precomputed phenotype matches.

use std::collections::HashMap;
use std::path::Path;

use enum_map::EnumMap;

use super::term::{Organism, PhenotypeMatch, PhenotypeMatchBuilder, PhenotypeTerm};
use crate::common::open_read_maybe_gz;
use crate::err::PhenoError;

/// Trait for the source of precomputed matches of query terms against an
/// organism's ontology.
pub trait PhenotypeMatchLookup {
    /// Return all matches of `term` against the ontology of `organism`.
    ///
    /// An empty result is not an error.
    fn matches_for_term(
        &self,
        organism: Organism,
        term: &PhenotypeTerm,
    ) -> Result<Vec<PhenotypeMatch>, anyhow::Error>;
}

/// Record of a match table TSV file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Record {
    pub query_id: String,
    pub query_label: String,
    pub match_id: String,
    pub match_label: String,
    pub lcs_id: String,
    pub lcs_label: String,
    pub ic: f64,
    pub simj: f64,
    /// Explicit score, `sqrt(ic * simj)` when empty.
    #[serde(default = "Option::default")]
    pub score: Option<f64>,
}

impl TryFrom<Record> for PhenotypeMatch {
    type Error = anyhow::Error;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        let mut builder = PhenotypeMatchBuilder::default();
        builder
            .query_phenotype(PhenotypeTerm::new(record.query_id, record.query_label))
            .match_phenotype(PhenotypeTerm::new(record.match_id, record.match_label))
            .lcs(PhenotypeTerm::new(record.lcs_id, record.lcs_label))
            .ic(record.ic)
            .sim_j(record.simj);
        if let Some(score) = record.score {
            builder.score(score);
        }
        builder
            .build()
            .map_err(|e| anyhow::anyhow!("invalid phenotype match: {}", e))
    }
}

/// In-memory table of precomputed matches, per organism and query term id.
#[derive(Debug, Default, Clone)]
pub struct MatchTable {
    tables: EnumMap<Organism, Option<HashMap<String, Vec<PhenotypeMatch>>>>,
}

impl MatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one match to the table of `organism`.
    ///
    /// # Errors
    ///
    /// If the matched term does not belong to the organism's ontology.
    pub fn insert(&mut self, organism: Organism, m: PhenotypeMatch) -> Result<(), PhenoError> {
        let match_organism = Organism::from_term_id(m.match_phenotype_id())?;
        if match_organism != organism {
            return Err(PhenoError::OrganismMismatch {
                organism,
                term_id: m.match_phenotype_id().to_string(),
            });
        }
        self.tables[organism]
            .get_or_insert_with(HashMap::new)
            .entry(m.query_phenotype_id().to_string())
            .or_default()
            .push(m);
        Ok(())
    }

    /// Whether any matches were loaded for `organism`.
    pub fn has_organism(&self, organism: Organism) -> bool {
        self.tables[organism].is_some()
    }

    /// Number of matches loaded for `organism`.
    pub fn num_matches(&self, organism: Organism) -> usize {
        self.tables[organism]
            .as_ref()
            .map(|table| table.values().map(Vec::len).sum())
            .unwrap_or_default()
    }

    /// Load the matches of `organism` from a TSV file with header, the file
    /// may be gzip-compressed.
    pub fn load_tsv<P>(&mut self, organism: Organism, path: P) -> Result<(), anyhow::Error>
    where
        P: AsRef<Path>,
    {
        tracing::debug!("loading {} matches from {:?}", organism, path.as_ref());
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(open_read_maybe_gz(path.as_ref())?);
        // Mark the organism as loaded even if the file has no records.
        self.tables[organism].get_or_insert_with(HashMap::new);
        for (i, result) in rdr.deserialize().enumerate() {
            let record: Record = result.map_err(|e| {
                anyhow::anyhow!("problem reading record {} of {:?}: {}", i, path.as_ref(), e)
            })?;
            self.insert(organism, PhenotypeMatch::try_from(record)?)?;
        }
        Ok(())
    }
}

impl PhenotypeMatchLookup for MatchTable {
    fn matches_for_term(
        &self,
        organism: Organism,
        term: &PhenotypeTerm,
    ) -> Result<Vec<PhenotypeMatch>, anyhow::Error> {
        Ok(self.tables[organism]
            .as_ref()
            .and_then(|table| table.get(term.id()))
            .cloned()
            .unwrap_or_default())
    }
}
