//! Ontology terms and precomputed pairwise term matches.

use std::cmp::Ordering;

use crate::err::PhenoError;

/// Organism whose phenotype ontology a term or model belongs to.
#[derive(
    serde::Serialize,
    serde::Deserialize,
    enum_map::Enum,
    strum::Display,
    strum::EnumString,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    Debug,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Organism {
    /// Homo sapiens, Human Phenotype Ontology.
    Human,
    /// Mus musculus, Mammalian Phenotype Ontology.
    Mouse,
    /// Danio rerio, Zebrafish Phenotype Ontology.
    Fish,
}

impl Organism {
    /// Prefix of the organism's phenotype ontology term ids.
    pub fn ontology_prefix(&self) -> &'static str {
        match self {
            Organism::Human => "HP",
            Organism::Mouse => "MP",
            Organism::Fish => "ZP",
        }
    }

    /// NCBI taxonomy id.
    pub fn ncbi_taxon_id(&self) -> u32 {
        match self {
            Organism::Human => 9606,
            Organism::Mouse => 10090,
            Organism::Fish => 7955,
        }
    }

    /// Determine the organism from the prefix of an ontology term id such
    /// as `"MP:0001262"`.
    pub fn from_term_id(term_id: &str) -> Result<Self, PhenoError> {
        match term_id.split_once(':').map(|(prefix, _)| prefix) {
            Some("HP") => Ok(Organism::Human),
            Some("MP") => Ok(Organism::Mouse),
            Some("ZP") => Ok(Organism::Fish),
            _ => Err(PhenoError::UnknownPrefix(term_id.to_string())),
        }
    }
}

/// A single term of a phenotype ontology.
///
/// Terms of clinical observations that were explicitly excluded for the
/// patient carry `present == false`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct PhenotypeTerm {
    id: String,
    label: String,
    #[serde(default = "_default_present")]
    present: bool,
}

/// Return default of `PhenotypeTerm::present`.
fn _default_present() -> bool {
    true
}

impl PhenotypeTerm {
    /// Create a term for an observed phenotype.
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_presence(id, label, true)
    }

    /// Create a term for a phenotype that was explicitly ruled out.
    pub fn not_present(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self::with_presence(id, label, false)
    }

    pub fn with_presence(id: impl Into<String>, label: impl Into<String>, present: bool) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            present,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_present(&self) -> bool {
        self.present
    }
}

impl PartialOrd for PhenotypeTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PhenotypeTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.label.cmp(&other.label))
            .then_with(|| self.present.cmp(&other.present))
    }
}

/// Precomputed similarity between a query term and a term of the target
/// organism's ontology.
///
/// Use `PhenotypeMatchBuilder` for construction.  If no score is given, it
/// defaults to `sqrt(ic * sim_j)`.
#[derive(
    Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize, derive_builder::Builder,
)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct PhenotypeMatch {
    /// The query term, usually from the HPO.
    #[builder(setter(into))]
    query_phenotype: PhenotypeTerm,
    /// The term of the target organism's ontology.
    #[builder(setter(into))]
    match_phenotype: PhenotypeTerm,
    /// Lowest common subsumer of both terms.
    #[builder(setter(into))]
    lcs: PhenotypeTerm,
    /// Information content of the LCS.
    #[builder(default)]
    ic: f64,
    /// Jaccard similarity of the ancestor sets.
    #[builder(default)]
    sim_j: f64,
    #[builder(default = "self.default_score()")]
    score: f64,
}

impl PhenotypeMatchBuilder {
    fn default_score(&self) -> f64 {
        (self.ic.unwrap_or_default() * self.sim_j.unwrap_or_default()).sqrt()
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(ic) = self.ic {
            if !ic.is_finite() || ic < 0.0 {
                return Err(format!(
                    "information content must be finite and >= 0, got {}",
                    ic
                ));
            }
        }
        if let Some(sim_j) = self.sim_j {
            if !(0.0..=1.0).contains(&sim_j) {
                return Err(format!("simJ must be in [0, 1], got {}", sim_j));
            }
        }
        if let Some(score) = self.score {
            if !score.is_finite() {
                return Err(format!("score must be finite, got {}", score));
            }
        }
        Ok(())
    }
}

impl PhenotypeMatch {
    pub fn query_phenotype(&self) -> &PhenotypeTerm {
        &self.query_phenotype
    }

    pub fn query_phenotype_id(&self) -> &str {
        self.query_phenotype.id()
    }

    pub fn match_phenotype(&self) -> &PhenotypeTerm {
        &self.match_phenotype
    }

    pub fn match_phenotype_id(&self) -> &str {
        self.match_phenotype.id()
    }

    pub fn lcs(&self) -> &PhenotypeTerm {
        &self.lcs
    }

    pub fn ic(&self) -> f64 {
        self.ic
    }

    pub fn sim_j(&self) -> f64 {
        self.sim_j
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    /// Replace the query term, e.g., by the patient's term carrying the
    /// presence flag.
    pub fn with_query_phenotype(self, query_phenotype: PhenotypeTerm) -> Self {
        Self {
            query_phenotype,
            ..self
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;

    #[rstest::fixture]
    fn short_stature_match() -> PhenotypeMatch {
        PhenotypeMatchBuilder::default()
            .query_phenotype(PhenotypeTerm::new("HP:0004322", "Short stature"))
            .match_phenotype(PhenotypeTerm::new("MP:0001265", "decreased body size"))
            .lcs(PhenotypeTerm::new("HP:0000002", "Abnormality of body height"))
            .ic(2.25)
            .sim_j(0.64)
            .build()
            .expect("valid match")
    }

    #[rstest::rstest]
    fn builder_default_score(short_stature_match: PhenotypeMatch) {
        assert!(approx_eq!(
            f64,
            short_stature_match.score(),
            1.2,
            epsilon = 1e-12
        ));
        assert_eq!(short_stature_match.query_phenotype_id(), "HP:0004322");
        assert_eq!(short_stature_match.match_phenotype_id(), "MP:0001265");
        assert_eq!(short_stature_match.ic(), 2.25);
        assert_eq!(short_stature_match.sim_j(), 0.64);
        assert_eq!(
            short_stature_match.lcs().label(),
            "Abnormality of body height"
        );
    }

    #[test]
    fn builder_explicit_score() -> Result<(), anyhow::Error> {
        let m = PhenotypeMatchBuilder::default()
            .query_phenotype(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .match_phenotype(PhenotypeTerm::new("MP:0000001", "mammalian phenotype"))
            .lcs(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .score(0.9)
            .build()?;
        assert_eq!(m.score(), 0.9);
        assert_eq!(m.ic(), 0.0);
        Ok(())
    }

    #[rstest::rstest]
    #[case(-1.0, 0.5)]
    #[case(f64::NAN, 0.5)]
    #[case(1.0, 1.5)]
    #[case(1.0, -0.1)]
    #[case(f64::INFINITY, 0.0)]
    #[case(1.0, f64::NAN)]
    fn builder_rejects_out_of_range(#[case] ic: f64, #[case] sim_j: f64) {
        let res = PhenotypeMatchBuilder::default()
            .query_phenotype(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .match_phenotype(PhenotypeTerm::new("MP:0000001", "mammalian phenotype"))
            .lcs(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .ic(ic)
            .sim_j(sim_j)
            .build();
        assert!(res.is_err());
    }

    #[rstest::rstest]
    #[case(f64::INFINITY)]
    #[case(f64::NEG_INFINITY)]
    #[case(f64::NAN)]
    fn builder_rejects_non_finite_score(#[case] score: f64) {
        let res = PhenotypeMatchBuilder::default()
            .query_phenotype(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .match_phenotype(PhenotypeTerm::new("MP:0000001", "mammalian phenotype"))
            .lcs(PhenotypeTerm::new("HP:0001156", "Brachydactyly"))
            .score(score)
            .build();
        assert!(res.is_err());
    }

    #[test]
    fn builder_requires_terms() {
        let res = PhenotypeMatchBuilder::default().score(1.0).build();
        assert!(res.is_err());
    }

    #[rstest::rstest]
    fn match_equality_covers_all_fields(short_stature_match: PhenotypeMatch) {
        let mut other = short_stature_match.clone();
        assert_eq!(short_stature_match, other);
        other.score = 0.5;
        assert!(short_stature_match != other);
    }

    #[test]
    fn term_equality_includes_presence() {
        let present = PhenotypeTerm::new("HP:0001250", "Seizure");
        let absent = PhenotypeTerm::not_present("HP:0001250", "Seizure");
        assert!(present != absent);
        assert!(present.is_present());
        assert!(!absent.is_present());
    }

    #[test]
    fn term_ordering_by_id() {
        let mut terms = vec![
            PhenotypeTerm::new("HP:0002705", "High, narrow palate"),
            PhenotypeTerm::new("HP:0001156", "Brachydactyly"),
            PhenotypeTerm::new("HP:0001533", "Slender build"),
        ];
        terms.sort();
        let ids = terms.iter().map(|t| t.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["HP:0001156", "HP:0001533", "HP:0002705"]);
    }

    #[rstest::rstest]
    #[case("HP:0001156", Organism::Human)]
    #[case("MP:0001265", Organism::Mouse)]
    #[case("ZP:0000001", Organism::Fish)]
    fn organism_from_term_id(#[case] term_id: &str, #[case] expected: Organism) {
        assert_eq!(Organism::from_term_id(term_id), Ok(expected));
        assert_eq!(expected.ontology_prefix(), &term_id[..2]);
    }

    #[test]
    fn organism_from_unknown_prefix() {
        assert_eq!(
            Organism::from_term_id("GO:0008150"),
            Err(PhenoError::UnknownPrefix(String::from("GO:0008150")))
        );
        assert!(Organism::from_term_id("no-colon").is_err());
    }

    #[test]
    fn organism_strings() -> Result<(), anyhow::Error> {
        assert_eq!(Organism::Mouse.to_string(), "mouse");
        assert_eq!(Organism::from_str("FISH")?, Organism::Fish);
        assert_eq!(Organism::Human.ncbi_taxon_id(), 9606);
        Ok(())
    }
}
