//! Candidate models and their scored phenotype matches.

use std::cmp::Ordering;

use super::term::{Organism, PhenotypeMatch};

/// Trait for entities that carry phenotype annotations to be scored.
pub trait Model {
    /// Identifier of the model, e.g., `"OMIM:101600"` or `"MGI:95523_1"`.
    fn id(&self) -> &str;

    /// Organism whose ontology the phenotype ids belong to.
    fn organism(&self) -> Organism;

    /// Phenotype ids in the organism's ontology.
    fn phenotype_ids(&self) -> &[String];
}

/// Human disease associated with a gene, annotated with HPO terms.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct GeneDiseaseModel {
    pub model_id: String,
    /// Disease id, e.g., `"OMIM:101600"`.
    pub disease_id: String,
    pub disease_term: String,
    pub entrez_gene_id: u32,
    pub human_gene_symbol: String,
    pub phenotype_ids: Vec<String>,
}

impl Model for GeneDiseaseModel {
    fn id(&self) -> &str {
        &self.model_id
    }

    fn organism(&self) -> Organism {
        Organism::Human
    }

    fn phenotype_ids(&self) -> &[String] {
        &self.phenotype_ids
    }
}

/// Mouse or fish model of the ortholog of a human gene.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct GeneOrthologModel {
    pub model_id: String,
    pub organism: Organism,
    pub entrez_gene_id: u32,
    pub human_gene_symbol: String,
    /// Gene id in the model organism database, e.g., `"MGI:95523"`.
    pub model_gene_id: String,
    pub model_gene_symbol: String,
    pub phenotype_ids: Vec<String>,
}

impl Model for GeneOrthologModel {
    fn id(&self) -> &str {
        &self.model_id
    }

    fn organism(&self) -> Organism {
        self.organism
    }

    fn phenotype_ids(&self) -> &[String] {
        &self.phenotype_ids
    }
}

/// Any model of a human gene.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneModel {
    Disease(GeneDiseaseModel),
    Ortholog(GeneOrthologModel),
}

impl GeneModel {
    pub fn entrez_gene_id(&self) -> u32 {
        match self {
            GeneModel::Disease(model) => model.entrez_gene_id,
            GeneModel::Ortholog(model) => model.entrez_gene_id,
        }
    }

    pub fn human_gene_symbol(&self) -> &str {
        match self {
            GeneModel::Disease(model) => &model.human_gene_symbol,
            GeneModel::Ortholog(model) => &model.human_gene_symbol,
        }
    }
}

impl Model for GeneModel {
    fn id(&self) -> &str {
        match self {
            GeneModel::Disease(model) => model.id(),
            GeneModel::Ortholog(model) => model.id(),
        }
    }

    fn organism(&self) -> Organism {
        match self {
            GeneModel::Disease(model) => model.organism(),
            GeneModel::Ortholog(model) => model.organism(),
        }
    }

    fn phenotype_ids(&self) -> &[String] {
        match self {
            GeneModel::Disease(model) => model.phenotype_ids(),
            GeneModel::Ortholog(model) => model.phenotype_ids(),
        }
    }
}

/// A model with its normalized phenotype score in `[0, 1]`.
///
/// Ordering and equality only consider the score.  The natural order is
/// descending by score, so `sort()` puts the best model first.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelPhenotypeMatch<M> {
    score: f64,
    model: M,
    best_model_phenotype_matches: Vec<PhenotypeMatch>,
}

impl<M> ModelPhenotypeMatch<M> {
    pub fn new(score: f64, model: M, best_model_phenotype_matches: Vec<PhenotypeMatch>) -> Self {
        Self {
            score,
            model,
            best_model_phenotype_matches,
        }
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn best_model_phenotype_matches(&self) -> &[PhenotypeMatch] {
        &self.best_model_phenotype_matches
    }
}

impl<M: Model> ModelPhenotypeMatch<M> {
    pub fn id(&self) -> &str {
        self.model.id()
    }

    pub fn organism(&self) -> Organism {
        self.model.organism()
    }
}

impl<M> PartialEq for ModelPhenotypeMatch<M> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<M> Eq for ModelPhenotypeMatch<M> {}

impl<M> PartialOrd for ModelPhenotypeMatch<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for ModelPhenotypeMatch<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.total_cmp(&self.score)
    }
}
