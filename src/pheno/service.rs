//! Construction of per-organism matchers from the query terms.

use std::time::Instant;

use super::lookup::PhenotypeMatchLookup;
use super::matcher::CrossSpeciesPhenotypeMatcher;
use super::query::{QueryPhenotypeMatch, TermPhenotypeMatches};
use super::term::{Organism, PhenotypeTerm};

/// Builds matchers for the query terms using a `PhenotypeMatchLookup`.
#[derive(Debug, Clone)]
pub struct PhenotypeMatchService<L> {
    lookup: L,
}

impl<L: PhenotypeMatchLookup> PhenotypeMatchService<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Collect the candidate matches of each query term in `organism`.
    ///
    /// Every query term becomes a key, also if it has no match.  The query
    /// term of each match is replaced by the given term so that the presence
    /// flag of the query is kept.
    pub fn term_phenotype_matches(
        &self,
        organism: Organism,
        query_terms: &[PhenotypeTerm],
    ) -> Result<TermPhenotypeMatches, anyhow::Error> {
        let mut result = TermPhenotypeMatches::new();
        for term in query_terms {
            let matches = self
                .lookup
                .matches_for_term(organism, term)?
                .into_iter()
                .map(|m| m.with_query_phenotype(term.clone()))
                .collect::<Vec<_>>();
            tracing::trace!("{} matches for {} in {}", matches.len(), term.id(), organism);
            result.insert(term.clone(), matches);
        }
        Ok(result)
    }

    pub fn query_phenotype_match(
        &self,
        organism: Organism,
        query_terms: &[PhenotypeTerm],
    ) -> Result<QueryPhenotypeMatch, anyhow::Error> {
        Ok(QueryPhenotypeMatch::new(
            organism,
            &self.term_phenotype_matches(organism, query_terms)?,
        ))
    }

    /// Build the matcher of the query terms against `organism`.
    pub fn build_matcher(
        &self,
        organism: Organism,
        query_terms: &[PhenotypeTerm],
    ) -> Result<CrossSpeciesPhenotypeMatcher, anyhow::Error> {
        let before = Instant::now();
        let matcher = CrossSpeciesPhenotypeMatcher::new(
            organism,
            self.term_phenotype_matches(organism, query_terms)?,
        )?;
        tracing::info!(
            "  built {} phenotype matcher in {:?}",
            organism,
            before.elapsed()
        );
        Ok(matcher)
    }
}
