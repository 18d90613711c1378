//! Normalization of raw match scores into model scores (PhenoDigm method).

use super::matcher::{PhenodigmMatchRawScore, PhenotypeMatcher};
use super::model::{Model, ModelPhenotypeMatch};
use super::query::QueryPhenotypeMatch;

/// Trait for turning a model into a scored `ModelPhenotypeMatch`.
pub trait ModelScorer<M> {
    fn score_model(&self, model: M) -> ModelPhenotypeMatch<M>;
}

/// Selects the source of the normalization ceilings and the number of query
/// phenotypes.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, strum::Display)]
#[serde(tag = "mode", rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScoringMode {
    /// Query and models share the organism (e.g., HP-HP).  Uses the matcher's
    /// ceilings and all of its query terms.
    SameSpecies,
    /// Models of one other organism.  Uses the matcher's ceilings but only
    /// counts the query terms that have a match in that organism.
    SingleCrossSpecies,
    /// Models of several organisms ranked together.  Ceilings and number of
    /// query terms come from the `reference`, usually the HP-HP matches, so
    /// that all organisms are scored on the same scale.
    MultiCrossSpecies { reference: QueryPhenotypeMatch },
}

/// Scorer following the PhenoDigm method.
///
/// The combined score is the mean of the model's best match relative to the
/// theoretical maximum and its average best match relative to the
/// theoretical best average, clamped to `[0, 1]`.
#[derive(Debug, Clone)]
pub struct PhenodigmModelScorer<T> {
    matcher: T,
    theoretical_max_match_score: f64,
    theoretical_best_avg_score: f64,
    num_query_phenotypes: usize,
}

impl<T: PhenotypeMatcher> PhenodigmModelScorer<T> {
    pub fn new(matcher: T, mode: ScoringMode) -> Self {
        let (theoretical_max_match_score, theoretical_best_avg_score, num_query_phenotypes) =
            match &mode {
                ScoringMode::SameSpecies => {
                    let qpm = matcher.query_phenotype_match();
                    (
                        qpm.max_match_score(),
                        qpm.best_avg_score(),
                        qpm.query_terms().len(),
                    )
                }
                ScoringMode::SingleCrossSpecies => {
                    let qpm = matcher.query_phenotype_match();
                    (
                        qpm.max_match_score(),
                        qpm.best_avg_score(),
                        qpm.best_phenotype_matches().len(),
                    )
                }
                ScoringMode::MultiCrossSpecies { reference } => (
                    reference.max_match_score(),
                    reference.best_avg_score(),
                    reference.query_terms().len(),
                ),
            };

        tracing::debug!(
            "{} scorer ({}): theoretical max = {}, theoretical best avg = {}, query phenotypes = {}",
            matcher.organism(),
            &mode,
            theoretical_max_match_score,
            theoretical_best_avg_score,
            num_query_phenotypes
        );

        Self {
            matcher,
            theoretical_max_match_score,
            theoretical_best_avg_score,
            num_query_phenotypes,
        }
    }

    pub fn matcher(&self) -> &T {
        &self.matcher
    }

    pub fn theoretical_max_match_score(&self) -> f64 {
        self.theoretical_max_match_score
    }

    pub fn theoretical_best_avg_score(&self) -> f64 {
        self.theoretical_best_avg_score
    }

    pub fn num_query_phenotypes(&self) -> usize {
        self.num_query_phenotypes
    }

    /// Convert the raw score into the normalized combined score in `[0, 1]`.
    pub fn calculate_combined_score(&self, raw: &PhenodigmMatchRawScore) -> f64 {
        if raw.sum_model_best_match_scores <= 0.0 {
            return 0.0;
        }
        let total_phenotypes_with_match =
            self.num_query_phenotypes + raw.matching_phenotypes.len();
        let model_best_avg_score =
            raw.sum_model_best_match_scores / total_phenotypes_with_match as f64;

        let combined_score = 50.0
            * (ratio(raw.max_model_match_score, self.theoretical_max_match_score)
                + ratio(model_best_avg_score, self.theoretical_best_avg_score));
        if !combined_score.is_finite() {
            return 0.0;
        }
        combined_score.clamp(0.0, 100.0) / 100.0
    }
}

/// `numerator / denominator` or 0 for a zero denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl<M: Model, T: PhenotypeMatcher> ModelScorer<M> for PhenodigmModelScorer<T> {
    fn score_model(&self, model: M) -> ModelPhenotypeMatch<M> {
        let raw = self.matcher.match_phenotype_ids(model.phenotype_ids());
        let score = self.calculate_combined_score(&raw);
        tracing::trace!("{} {:?} -> {}", model.id(), &raw, score);
        ModelPhenotypeMatch::new(score, model, raw.best_phenotype_matches)
    }
}
