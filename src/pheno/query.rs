//! Best possible matches of the query terms against one organism.

use super::term::{Organism, PhenotypeMatch, PhenotypeTerm};

/// Candidate matches for each query term, in query order.
///
/// Every query term is a key, terms without any candidate map to an empty
/// list.
pub type TermPhenotypeMatches = indexmap::IndexMap<PhenotypeTerm, Vec<PhenotypeMatch>>;

/// The best match of every query term in one organism together with the
/// theoretical ceilings used for normalizing model scores.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryPhenotypeMatch {
    organism: Organism,
    query_terms: Vec<PhenotypeTerm>,
    best_phenotype_matches: Vec<PhenotypeMatch>,
    max_match_score: f64,
    best_avg_score: f64,
}

impl QueryPhenotypeMatch {
    pub fn new(organism: Organism, term_phenotype_matches: &TermPhenotypeMatches) -> Self {
        let query_terms = term_phenotype_matches.keys().cloned().collect::<Vec<_>>();
        let best_phenotype_matches = term_phenotype_matches
            .values()
            .filter_map(|matches| best_match(matches))
            .cloned()
            .collect::<Vec<_>>();

        let max_match_score = best_phenotype_matches
            .iter()
            .map(PhenotypeMatch::score)
            .fold(0f64, f64::max);
        let best_avg_score = if best_phenotype_matches.is_empty() {
            0f64
        } else {
            let sum = best_phenotype_matches
                .iter()
                .map(PhenotypeMatch::score)
                .sum::<f64>();
            sum / query_terms.len() as f64
        };

        tracing::debug!(
            "{} query terms, {} with a match in {}; max = {}, best avg = {}",
            query_terms.len(),
            best_phenotype_matches.len(),
            organism,
            max_match_score,
            best_avg_score
        );

        Self {
            organism,
            query_terms,
            best_phenotype_matches,
            max_match_score,
            best_avg_score,
        }
    }

    pub fn organism(&self) -> Organism {
        self.organism
    }

    /// All query terms, including those without any match.
    pub fn query_terms(&self) -> &[PhenotypeTerm] {
        &self.query_terms
    }

    pub fn query_term_ids(&self) -> Vec<&str> {
        self.query_terms.iter().map(PhenotypeTerm::id).collect()
    }

    /// One highest-scoring match per query term that has any match.
    pub fn best_phenotype_matches(&self) -> &[PhenotypeMatch] {
        &self.best_phenotype_matches
    }

    pub fn max_match_score(&self) -> f64 {
        self.max_match_score
    }

    /// Sum of the best match scores divided by the number of *all* query
    /// terms.
    pub fn best_avg_score(&self) -> f64 {
        self.best_avg_score
    }
}

/// Highest-scoring match, the first one wins on ties.
fn best_match(matches: &[PhenotypeMatch]) -> Option<&PhenotypeMatch> {
    matches.iter().fold(None, |best, m| match best {
        Some(best) if best.score() >= m.score() => Some(best),
        _ => Some(m),
    })
}
