//! Matching of a model's phenotypes against the query terms of one organism.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

use super::query::{QueryPhenotypeMatch, TermPhenotypeMatches};
use super::term::{Organism, PhenotypeMatch, PhenotypeTerm};
use crate::err::PhenoError;

/// Raw numbers computed by a `PhenotypeMatcher` for one model.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct PhenodigmMatchRawScore {
    /// Highest best-match score seen in either direction.
    pub max_model_match_score: f64,
    /// Sum of the forward and the reciprocal best-match scores.
    pub sum_model_best_match_scores: f64,
    /// Model phenotype ids with at least one candidate match, in model order.
    pub matching_phenotypes: Vec<String>,
    /// Best match for each query term that matched the model.
    pub best_phenotype_matches: Vec<PhenotypeMatch>,
}

/// Trait for matching model phenotypes against a fixed set of query terms.
pub trait PhenotypeMatcher {
    fn organism(&self) -> Organism;

    fn query_terms(&self) -> &[PhenotypeTerm];

    fn term_phenotype_matches(&self) -> &TermPhenotypeMatches;

    fn query_phenotype_match(&self) -> &QueryPhenotypeMatch;

    fn best_phenotype_matches(&self) -> &[PhenotypeMatch] {
        self.query_phenotype_match().best_phenotype_matches()
    }

    /// Compute the raw score of a model given its phenotype ids in the
    /// matcher's organism.
    fn match_phenotype_ids(&self, model_phenotype_ids: &[String]) -> PhenodigmMatchRawScore;
}

impl<T: PhenotypeMatcher + ?Sized> PhenotypeMatcher for &T {
    fn organism(&self) -> Organism {
        (**self).organism()
    }

    fn query_terms(&self) -> &[PhenotypeTerm] {
        (**self).query_terms()
    }

    fn term_phenotype_matches(&self) -> &TermPhenotypeMatches {
        (**self).term_phenotype_matches()
    }

    fn query_phenotype_match(&self) -> &QueryPhenotypeMatch {
        (**self).query_phenotype_match()
    }

    fn match_phenotype_ids(&self, model_phenotype_ids: &[String]) -> PhenodigmMatchRawScore {
        (**self).match_phenotype_ids(model_phenotype_ids)
    }
}

/// `PhenotypeMatcher` backed by precomputed matches of the query terms
/// against the ontology of a single organism.
///
/// All lookup structures are built once in `new()` and only read afterwards,
/// so one instance can be shared between threads scoring different models.
#[derive(Debug, Clone)]
pub struct CrossSpeciesPhenotypeMatcher {
    organism: Organism,
    term_phenotype_matches: TermPhenotypeMatches,
    query_phenotype_match: QueryPhenotypeMatch,
    /// Every match target id occuring in the table.
    matched_organism_phenotype_ids: IndexSet<String>,
    /// Every query term id.
    matched_query_phenotype_ids: IndexSet<String>,
    /// Indices into `matched_query_phenotype_ids` of the query terms with a
    /// best match, in term order.
    hp_ids_with_phenotype_match: Vec<usize>,
    /// Pairwise matches keyed by `(query id index, organism id index)`.
    mapped_terms: HashMap<(usize, usize), PhenotypeMatch>,
}

impl CrossSpeciesPhenotypeMatcher {
    /// Construct matcher from the candidate matches of each query term.
    ///
    /// # Errors
    ///
    /// If a match is filed under a query term with a different id.
    pub fn new(
        organism: Organism,
        term_phenotype_matches: TermPhenotypeMatches,
    ) -> Result<Self, PhenoError> {
        for (term, matches) in &term_phenotype_matches {
            if let Some(m) = matches.iter().find(|m| m.query_phenotype_id() != term.id()) {
                return Err(PhenoError::QueryTermMismatch {
                    expected: term.id().to_string(),
                    found: m.query_phenotype_id().to_string(),
                });
            }
        }

        let query_phenotype_match = QueryPhenotypeMatch::new(organism, &term_phenotype_matches);

        let mut matched_query_phenotype_ids = IndexSet::new();
        let mut matched_organism_phenotype_ids = IndexSet::new();
        let mut mapped_terms: HashMap<(usize, usize), PhenotypeMatch> = HashMap::new();
        for (term, matches) in &term_phenotype_matches {
            let (hp, _) = matched_query_phenotype_ids.insert_full(term.id().to_string());
            for m in matches {
                let (mp, _) =
                    matched_organism_phenotype_ids.insert_full(m.match_phenotype_id().to_string());
                // The same pair may be listed under a present and an excluded
                // query term, keep the better one.
                match mapped_terms.get(&(hp, mp)) {
                    Some(prev) if prev.score() >= m.score() => (),
                    _ => {
                        mapped_terms.insert((hp, mp), m.clone());
                    }
                }
            }
        }

        let hp_ids_with_phenotype_match = query_phenotype_match
            .best_phenotype_matches()
            .iter()
            .map(PhenotypeMatch::query_phenotype)
            .sorted()
            .filter_map(|term| matched_query_phenotype_ids.get_index_of(term.id()))
            .unique()
            .collect::<Vec<_>>();

        tracing::debug!(
            "built {} matcher: {} query terms, {} organism terms, {} pairs",
            organism,
            matched_query_phenotype_ids.len(),
            matched_organism_phenotype_ids.len(),
            mapped_terms.len()
        );

        Ok(Self {
            organism,
            term_phenotype_matches,
            query_phenotype_match,
            matched_organism_phenotype_ids,
            matched_query_phenotype_ids,
            hp_ids_with_phenotype_match,
            mapped_terms,
        })
    }

    /// Ids of all organism terms that any query term can be matched to.
    pub fn matched_organism_phenotype_ids(&self) -> &IndexSet<String> {
        &self.matched_organism_phenotype_ids
    }

    pub fn matched_query_phenotype_ids(&self) -> &IndexSet<String> {
        &self.matched_query_phenotype_ids
    }

    /// Precomputed match between a query term and an organism term, if any.
    pub fn mapped_term(&self, query_id: &str, match_id: &str) -> Option<&PhenotypeMatch> {
        let hp = self.matched_query_phenotype_ids.get_index_of(query_id)?;
        let mp = self.matched_organism_phenotype_ids.get_index_of(match_id)?;
        self.mapped_terms.get(&(hp, mp))
    }
}

/// Running totals shared by the forward and the reciprocal pass.
#[derive(Debug, Default)]
struct MatchAccumulator<'a> {
    max_model_match_score: f64,
    sum_model_best_match_scores: f64,
    best_phenotype_match_for_terms: IndexMap<&'a PhenotypeTerm, &'a PhenotypeMatch>,
}

impl<'a> MatchAccumulator<'a> {
    /// Record `m` unless the query term already has a better match.
    fn record(&mut self, m: &'a PhenotypeMatch) {
        match self.best_phenotype_match_for_terms.get(m.query_phenotype()) {
            Some(current) if current.score() >= m.score() => (),
            _ => {
                self.best_phenotype_match_for_terms
                    .insert(m.query_phenotype(), m);
            }
        }
    }

    fn add_best_match_score(&mut self, best_match_score: f64) {
        if best_match_score > 0.0 {
            self.sum_model_best_match_scores += best_match_score;
            self.max_model_match_score = self.max_model_match_score.max(best_match_score);
        }
    }
}

impl PhenotypeMatcher for CrossSpeciesPhenotypeMatcher {
    fn organism(&self) -> Organism {
        self.organism
    }

    fn query_terms(&self) -> &[PhenotypeTerm] {
        self.query_phenotype_match.query_terms()
    }

    fn term_phenotype_matches(&self) -> &TermPhenotypeMatches {
        &self.term_phenotype_matches
    }

    fn query_phenotype_match(&self) -> &QueryPhenotypeMatch {
        &self.query_phenotype_match
    }

    fn match_phenotype_ids(&self, model_phenotype_ids: &[String]) -> PhenodigmMatchRawScore {
        // Model ids that can be matched at all, duplicates are kept.
        let (matching_phenotypes, mp_idxs): (Vec<String>, Vec<usize>) = model_phenotype_ids
            .iter()
            .filter_map(|id| {
                self.matched_organism_phenotype_ids
                    .get_index_of(id.as_str())
                    .map(|idx| (id.clone(), idx))
            })
            .unzip();

        let mut acc = MatchAccumulator::default();

        // Forward pass: best model phenotype for every query term.
        for &hp in &self.hp_ids_with_phenotype_match {
            let mut best_match_score = 0f64;
            for &mp in &mp_idxs {
                if let Some(m) = self.mapped_terms.get(&(hp, mp)) {
                    best_match_score = best_match_score.max(m.score());
                    if m.score() > 0.0 {
                        acc.record(m);
                    }
                }
            }
            acc.add_best_match_score(best_match_score);
        }

        // Reciprocal pass: best query term for every model phenotype.  This
        // adds to the same sum as the forward pass, so pairs reachable in both
        // directions are counted twice.
        for &mp in &mp_idxs {
            let mut best_match_score = 0f64;
            for &hp in &self.hp_ids_with_phenotype_match {
                if let Some(m) = self.mapped_terms.get(&(hp, mp)) {
                    best_match_score = best_match_score.max(m.score());
                    if m.score() > 0.0 {
                        acc.record(m);
                    }
                }
            }
            acc.add_best_match_score(best_match_score);
        }

        PhenodigmMatchRawScore::new(
            acc.max_model_match_score,
            acc.sum_model_best_match_scores,
            matching_phenotypes,
            acc.best_phenotype_match_for_terms
                .into_values()
                .cloned()
                .collect(),
        )
    }
}
