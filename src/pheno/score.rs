//! Code for ranking gene models by phenotype similarity on the command line.

use std::io::Write;
use std::time::Instant;

use clap::Parser;
use enum_map::EnumMap;
use rayon::prelude::*;
use tracing::info;

use super::lookup::{MatchTable, PhenotypeMatchLookup};
use super::matcher::PhenotypeMatcher;
use super::model::{GeneModel, Model, ModelPhenotypeMatch};
use super::query::QueryPhenotypeMatch;
use super::scorer::{ModelScorer, PhenodigmModelScorer, ScoringMode};
use super::service::PhenotypeMatchService;
use super::term::{Organism, PhenotypeTerm};
use crate::common::{open_write_maybe_gz, trace_rss_now};
use crate::err::PhenoError;

/// The version of `phenodigm-worker` package.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// How models of non-human organisms are normalized.
///
/// Human models are always scored against the HP-HP ceilings.
#[derive(
    clap::ValueEnum,
    strum::Display,
    serde::Serialize,
    serde::Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ScoringModeArg {
    /// Use the organism's own ceilings and all query terms.
    SameSpecies,
    /// Use the organism's own ceilings and the matched query terms only.
    SingleCrossSpecies,
    /// Use the HP-HP ceilings for all organisms.
    #[default]
    MultiCrossSpecies,
}

/// Command line arguments for `pheno score` sub command.
#[derive(Parser, Debug)]
#[command(author, version, about = "Rank gene models by phenotype similarity", long_about = None)]
pub struct Args {
    /// Path to JSON file with the HPO terms of the patient.
    #[arg(long, required = true)]
    pub path_query_json: String,
    /// Path to JSON file with the models to score.
    #[arg(long, required = true)]
    pub path_models_json: String,

    /// Path to TSV file with HP-HP matches.
    #[arg(long)]
    pub path_matches_hp: Option<String>,
    /// Path to TSV file with HP-MP matches.
    #[arg(long)]
    pub path_matches_mp: Option<String>,
    /// Path to TSV file with HP-ZP matches.
    #[arg(long)]
    pub path_matches_zp: Option<String>,

    /// How to normalize scores of non-human models.
    #[arg(long, value_enum, default_value_t = ScoringModeArg::MultiCrossSpecies)]
    pub scoring_mode: ScoringModeArg,
    /// Only write out the best ranking models.
    #[arg(long)]
    pub max_results: Option<usize>,
    /// Number of threads to use for scoring (default is 1 thread per core).
    #[arg(long)]
    pub num_threads: Option<usize>,

    /// Path to output JSON file, stdout if not given.
    #[arg(long)]
    pub path_output: Option<String>,
}

/// Struct for loading a query term from JSON.
#[serde_with::skip_serializing_none]
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, PartialEq)]
pub struct QueryTerm {
    /// The term ID.
    pub term_id: String,
    /// The term name (optional).
    #[serde(default = "Option::default")]
    pub term_name: Option<String>,
    /// Whether the phenotype was explicitly ruled out.
    #[serde(default)]
    pub excluded: bool,
}

impl TryFrom<&QueryTerm> for PhenotypeTerm {
    type Error = PhenoError;

    fn try_from(value: &QueryTerm) -> Result<Self, Self::Error> {
        let organism = Organism::from_term_id(&value.term_id)?;
        if organism != Organism::Human {
            return Err(PhenoError::OrganismMismatch {
                organism: Organism::Human,
                term_id: value.term_id.clone(),
            });
        }
        Ok(PhenotypeTerm::with_presence(
            value.term_id.clone(),
            value.term_name.clone().unwrap_or_default(),
            !value.excluded,
        ))
    }
}

/// Query result records.
pub mod query_result {
    use crate::pheno::model::{GeneModel, Model, ModelPhenotypeMatch};
    use crate::pheno::term::{Organism, PhenotypeMatch, PhenotypeTerm};

    use super::{QueryTerm, ScoringModeArg};

    /// Result container data structure.
    #[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
    pub struct Container {
        /// Version of the `phenodigm-worker` package.
        pub version: String,
        /// The scoring mode used for non-human models.
        pub scoring_mode: ScoringModeArg,
        /// The original query records.
        pub query: Vec<QueryTerm>,
        /// The resulting records for the scored models, best first.
        pub result: Vec<Record>,
    }

    /// Score of a single model with the best matching terms.
    #[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
    pub struct Record {
        /// 1-based rank.
        pub rank: usize,
        pub model_id: String,
        pub organism: Organism,
        pub entrez_gene_id: u32,
        pub human_gene_symbol: String,
        /// The normalized score in `[0, 1]`.
        pub score: f64,
        /// Best match for each matching query term.
        pub terms: Vec<TermDetails>,
    }

    /// Detailed term scores.
    #[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
    pub struct TermDetails {
        /// The query HPO term.
        pub term_query: PhenotypeTerm,
        /// The model's term.
        pub term_model: PhenotypeTerm,
        /// The lowest common subsumer.
        pub lcs: PhenotypeTerm,
        /// The similarity score.
        pub score: f64,
    }

    impl From<&PhenotypeMatch> for TermDetails {
        fn from(m: &PhenotypeMatch) -> Self {
            Self {
                term_query: m.query_phenotype().clone(),
                term_model: m.match_phenotype().clone(),
                lcs: m.lcs().clone(),
                score: m.score(),
            }
        }
    }

    impl Record {
        pub fn with_rank(rank: usize, m: &ModelPhenotypeMatch<GeneModel>) -> Self {
            Self {
                rank,
                model_id: m.model().id().to_string(),
                organism: m.model().organism(),
                entrez_gene_id: m.model().entrez_gene_id(),
                human_gene_symbol: m.model().human_gene_symbol().to_string(),
                score: m.score(),
                terms: m
                    .best_model_phenotype_matches()
                    .iter()
                    .map(TermDetails::from)
                    .collect(),
            }
        }
    }
}

/// Score all `models` against the query terms and return them best first.
///
/// One matcher is built per organism that has models.  Human models are
/// scored with `ScoringMode::SameSpecies`, other organisms as selected by
/// `scoring_mode`.
pub fn run_query<L>(
    service: &PhenotypeMatchService<L>,
    query: &[PhenotypeTerm],
    models: Vec<GeneModel>,
    scoring_mode: ScoringModeArg,
) -> Result<Vec<ModelPhenotypeMatch<GeneModel>>, anyhow::Error>
where
    L: PhenotypeMatchLookup,
{
    let mut by_organism: EnumMap<Organism, Vec<GeneModel>> = EnumMap::default();
    for model in models {
        by_organism[model.organism()].push(model);
    }

    // HP-HP best matches, taken from the human matcher if there is one.  Human
    // models come first in `Organism` order.
    let mut human_reference: Option<QueryPhenotypeMatch> = None;

    let mut result = Vec::new();
    for (organism, models) in by_organism {
        if models.is_empty() {
            continue;
        }

        let matcher = service.build_matcher(organism, query)?;
        if organism == Organism::Human && scoring_mode == ScoringModeArg::MultiCrossSpecies {
            human_reference = Some(matcher.query_phenotype_match().clone());
        }
        let mode = match (organism, scoring_mode) {
            (Organism::Human, _) | (_, ScoringModeArg::SameSpecies) => ScoringMode::SameSpecies,
            (_, ScoringModeArg::SingleCrossSpecies) => ScoringMode::SingleCrossSpecies,
            (_, ScoringModeArg::MultiCrossSpecies) => {
                let reference = match human_reference.clone() {
                    Some(reference) => reference,
                    None => {
                        let reference = service.query_phenotype_match(Organism::Human, query)?;
                        human_reference = Some(reference.clone());
                        reference
                    }
                };
                ScoringMode::MultiCrossSpecies { reference }
            }
        };
        let scorer = PhenodigmModelScorer::new(&matcher, mode);

        info!("  scoring {} {} models ...", models.len(), organism);
        let before = Instant::now();
        let scored = models
            .into_par_iter()
            .map(|model| scorer.score_model(model))
            .collect::<Vec<_>>();
        info!(
            "  ... done scoring {} models in {:?}",
            organism,
            before.elapsed()
        );
        result.extend(scored);
    }

    result.sort();
    Ok(result)
}

/// Load the query terms from the JSON file at `path`.
fn load_query(path: &str) -> Result<Vec<QueryTerm>, anyhow::Error> {
    let query_json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read query from {}: {}", path, e))?;
    Ok(serde_json::from_str(&query_json)?)
}

/// Load the models from the JSON file at `path`.
fn load_models(path: &str) -> Result<Vec<GeneModel>, anyhow::Error> {
    let models_json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read models from {}: {}", path, e))?;
    Ok(serde_json::from_str(&models_json)?)
}

/// Main entry point for `pheno score` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("args_common = {:?}", &args_common);
    info!("args = {:?}", &args);

    if let Some(num_threads) = args.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()?;
    }

    info!("Loading (patient/query) HPO terms...");
    let before_query = Instant::now();
    let query = load_query(&args.path_query_json)?;
    let query_terms = query
        .iter()
        .map(PhenotypeTerm::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    info!(
        "... done loading {} HPO terms in {:?}",
        query_terms.len(),
        before_query.elapsed()
    );

    info!("Loading models...");
    let before_models = Instant::now();
    let models = load_models(&args.path_models_json)?;
    info!(
        "... done loading {} models in {:?}",
        models.len(),
        before_models.elapsed()
    );

    info!("Loading phenotype match tables...");
    let before_tables = Instant::now();
    let mut table = MatchTable::new();
    for (organism, path) in [
        (Organism::Human, &args.path_matches_hp),
        (Organism::Mouse, &args.path_matches_mp),
        (Organism::Fish, &args.path_matches_zp),
    ] {
        if let Some(path) = path {
            table.load_tsv(organism, path)?;
            info!(
                "  loaded {} {} matches",
                table.num_matches(organism),
                organism
            );
        }
    }
    info!(
        "... done loading phenotype match tables in {:?}",
        before_tables.elapsed()
    );
    if args.scoring_mode == ScoringModeArg::MultiCrossSpecies
        && !table.has_organism(Organism::Human)
    {
        return Err(PhenoError::MissingMatchTable(Organism::Human).into());
    }
    for model in &models {
        if !table.has_organism(model.organism()) {
            tracing::warn!(
                "no {} match table given, model {} will score 0",
                model.organism(),
                model.id()
            );
        }
    }

    trace_rss_now();

    info!("Starting prioritization...");
    let before_prioritization = Instant::now();
    let service = PhenotypeMatchService::new(table);
    let mut scored = run_query(&service, &query_terms, models, args.scoring_mode)?;
    if let Some(max_results) = args.max_results {
        scored.truncate(max_results);
    }
    info!(
        "... done with prioritization in {:?}",
        before_prioritization.elapsed()
    );

    let result = query_result::Container {
        version: VERSION.to_string(),
        scoring_mode: args.scoring_mode,
        query,
        result: scored
            .iter()
            .enumerate()
            .map(|(i, m)| query_result::Record::with_rank(i + 1, m))
            .collect(),
    };

    info!(
        "{: >4} | {: <20} | {: <10} | {: >6}",
        "rank", "model", "gene", "score"
    );
    for record in result.result.iter().take(10) {
        info!(
            "{: >4} | {: <20} | {: <10} | {: >6.4}",
            record.rank, record.model_id, record.human_gene_symbol, record.score
        );
    }

    if let Some(path_output) = &args.path_output {
        let mut writer = open_write_maybe_gz(path_output)?;
        serde_json::to_writer_pretty(&mut writer, &result)?;
        writer.flush()?;
    } else {
        serde_json::to_writer_pretty(std::io::stdout().lock(), &result)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::pheno::lookup::test::write_tsv;
    use crate::pheno::model::{GeneDiseaseModel, GeneOrthologModel};

    const HUMAN_TSV: &str = "\
query_id\tquery_label\tmatch_id\tmatch_label\tlcs_id\tlcs_label\tic\tsimj\tscore
HP:0001156\tBrachydactyly\tHP:0001156\tBrachydactyly\tHP:0001156\tBrachydactyly\t4.0\t1.0\t
HP:0001156\tBrachydactyly\tHP:0009803\tShort phalanx of finger\tHP:0001155\tAbnormality of the hand\t4.0\t0.25\t
HP:0001363\tCraniosynostosis\tHP:0001363\tCraniosynostosis\tHP:0001363\tCraniosynostosis\t4.0\t1.0\t
";

    const MOUSE_TSV: &str = "\
query_id\tquery_label\tmatch_id\tmatch_label\tlcs_id\tlcs_label\tic\tsimj\tscore
HP:0001156\tBrachydactyly\tMP:0002544\tbrachydactyly\tHP:0001156\tBrachydactyly\t4.0\t0.25\t
HP:0001363\tCraniosynostosis\tMP:0000081\tpremature suture closure\tHP:0001363\tCraniosynostosis\t4.0\t1.0\t
";

    fn query_terms() -> Vec<PhenotypeTerm> {
        vec![
            PhenotypeTerm::new("HP:0001156", "Brachydactyly"),
            PhenotypeTerm::new("HP:0001363", "Craniosynostosis"),
        ]
    }

    fn models() -> Vec<GeneModel> {
        vec![
            GeneModel::Ortholog(GeneOrthologModel::new(
                String::from("MGI:95523_1"),
                Organism::Mouse,
                2263,
                String::from("FGFR2"),
                String::from("MGI:95523"),
                String::from("Fgfr2"),
                vec![String::from("MP:0000081")],
            )),
            GeneModel::Disease(GeneDiseaseModel::new(
                String::from("OMIM:101600_2263"),
                String::from("OMIM:101600"),
                String::from("Pfeiffer syndrome"),
                2263,
                String::from("FGFR2"),
                vec![String::from("HP:0001156"), String::from("HP:0001363")],
            )),
            GeneModel::Disease(GeneDiseaseModel::new(
                String::from("OMIM:000000_1"),
                String::from("OMIM:000000"),
                String::from("Unrelated disease"),
                1,
                String::from("A1BG"),
                vec![String::from("HP:0000118")],
            )),
        ]
    }

    fn load_service() -> Result<PhenotypeMatchService<MatchTable>, anyhow::Error> {
        let mut table = MatchTable::new();
        let human = write_tsv(HUMAN_TSV)?;
        table.load_tsv(Organism::Human, human.path())?;
        let mouse = write_tsv(MOUSE_TSV)?;
        table.load_tsv(Organism::Mouse, mouse.path())?;
        Ok(PhenotypeMatchService::new(table))
    }

    #[test]
    fn rank_across_organisms() -> Result<(), anyhow::Error> {
        let service = load_service()?;
        let result = run_query(
            &service,
            &query_terms(),
            models(),
            ScoringModeArg::MultiCrossSpecies,
        )?;

        let ranked = result
            .iter()
            .map(|m| (m.id(), m.organism()))
            .collect::<Vec<_>>();
        assert_eq!(
            ranked,
            vec![
                ("OMIM:101600_2263", Organism::Human),
                ("MGI:95523_1", Organism::Mouse),
                ("OMIM:000000_1", Organism::Human),
            ]
        );

        // The disease model has exact matches for both terms.
        assert!(approx_eq!(f64, result[0].score(), 1.0, epsilon = 1e-12));
        // HP-HP ceilings: max = 2, best avg = 2.  Mouse: sum = 4, max = 2,
        // total = 2 + 1, combined = 50 * (2 / 2 + (4 / 3) / 2).
        assert!(approx_eq!(
            f64,
            result[1].score(),
            0.833_333_333_333_333_3,
            epsilon = 1e-12
        ));
        assert_eq!(result[2].score(), 0.0);
        assert!(result[2].best_model_phenotype_matches().is_empty());
        Ok(())
    }

    /// Number of HP-HP best match sets that were computed.
    fn count_human_references(lines: &[&str]) -> usize {
        lines
            .iter()
            .filter(|line| line.contains("with a match in human"))
            .count()
    }

    #[test]
    #[tracing_test::traced_test]
    fn human_reference_is_built_once() -> Result<(), anyhow::Error> {
        let service = load_service()?;
        run_query(
            &service,
            &query_terms(),
            models(),
            ScoringModeArg::MultiCrossSpecies,
        )?;
        logs_assert(|lines: &[&str]| match count_human_references(lines) {
            1 => Ok(()),
            n => Err(format!("HP-HP reference built {} times", n)),
        });
        Ok(())
    }

    #[test]
    #[tracing_test::traced_test]
    fn human_reference_without_human_models() -> Result<(), anyhow::Error> {
        let service = load_service()?;
        let fish_model = GeneOrthologModel::new(
            String::from("ZFIN:ZDB-GENE-1_1"),
            Organism::Fish,
            2263,
            String::from("FGFR2"),
            String::from("ZFIN:ZDB-GENE-1"),
            String::from("fgfr2"),
            vec![String::from("ZP:0000001")],
        );
        let mut mouse_models = models();
        mouse_models.truncate(1);
        mouse_models.push(GeneModel::Ortholog(fish_model));

        let result = run_query(
            &service,
            &query_terms(),
            mouse_models,
            ScoringModeArg::MultiCrossSpecies,
        )?;
        assert_eq!(result.len(), 2);
        assert!(approx_eq!(
            f64,
            result[0].score(),
            0.833_333_333_333_333_3,
            epsilon = 1e-12
        ));
        assert_eq!(result[1].organism(), Organism::Fish);
        logs_assert(|lines: &[&str]| match count_human_references(lines) {
            1 => Ok(()),
            n => Err(format!("HP-HP reference built {} times", n)),
        });
        Ok(())
    }

    #[test]
    fn single_cross_species_mouse() -> Result<(), anyhow::Error> {
        let service = load_service()?;
        let result = run_query(
            &service,
            &query_terms(),
            models().into_iter().take(1).collect(),
            ScoringModeArg::SingleCrossSpecies,
        )?;
        assert_eq!(result.len(), 1);
        // Mouse ceilings: max = 2, best avg = (1 + 2) / 2 = 1.5, two matched
        // query terms.  sum = 4, total = 2 + 1.
        // combined = 50 * (2 / 2 + (4 / 3) / 1.5)
        assert!(approx_eq!(
            f64,
            result[0].score(),
            0.944_444_444_444_444_4,
            epsilon = 1e-12
        ));
        Ok(())
    }

    #[test]
    fn query_term_conversion() {
        let term = QueryTerm {
            term_id: String::from("HP:0001250"),
            term_name: None,
            excluded: true,
        };
        let converted = PhenotypeTerm::try_from(&term).expect("valid HPO term");
        assert_eq!(converted, PhenotypeTerm::not_present("HP:0001250", ""));

        let term = QueryTerm {
            term_id: String::from("MP:0000081"),
            term_name: None,
            excluded: false,
        };
        assert!(PhenotypeTerm::try_from(&term).is_err());
    }

    #[test]
    fn run_writes_json() -> Result<(), anyhow::Error> {
        let tmp_dir = tempfile::tempdir()?;
        let path_query_json = tmp_dir.path().join("query.json");
        std::fs::write(
            &path_query_json,
            r#"[{"term_id": "HP:0001156", "term_name": "Brachydactyly"},
                {"term_id": "HP:0001363"}]"#,
        )?;
        let path_models_json = tmp_dir.path().join("models.json");
        std::fs::write(&path_models_json, serde_json::to_string(&models())?)?;
        let human = write_tsv(HUMAN_TSV)?;
        let mouse = write_tsv(MOUSE_TSV)?;
        let path_output = tmp_dir.path().join("result.json");

        let args = Args {
            path_query_json: path_query_json.to_string_lossy().to_string(),
            path_models_json: path_models_json.to_string_lossy().to_string(),
            path_matches_hp: Some(human.path().to_string_lossy().to_string()),
            path_matches_mp: Some(mouse.path().to_string_lossy().to_string()),
            path_matches_zp: None,
            scoring_mode: ScoringModeArg::MultiCrossSpecies,
            max_results: Some(2),
            num_threads: None,
            path_output: Some(path_output.to_string_lossy().to_string()),
        };
        let args_common = crate::common::Args {
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        run(&args_common, &args)?;

        let result: query_result::Container =
            serde_json::from_str(&std::fs::read_to_string(&path_output)?)?;
        assert_eq!(result.scoring_mode, ScoringModeArg::MultiCrossSpecies);
        assert_eq!(result.query.len(), 2);
        assert_eq!(result.result.len(), 2);
        assert_eq!(result.result[0].rank, 1);
        assert_eq!(result.result[0].model_id, "OMIM:101600_2263");
        assert_eq!(result.result[0].terms.len(), 2);
        assert_eq!(result.result[1].human_gene_symbol, "FGFR2");
        Ok(())
    }

    #[test]
    fn multi_cross_species_requires_human_table() -> Result<(), anyhow::Error> {
        let tmp_dir = tempfile::tempdir()?;
        let path_query_json = tmp_dir.path().join("query.json");
        std::fs::write(&path_query_json, r#"[{"term_id": "HP:0001156"}]"#)?;
        let path_models_json = tmp_dir.path().join("models.json");
        std::fs::write(&path_models_json, "[]")?;
        let mouse = write_tsv(MOUSE_TSV)?;

        let args = Args {
            path_query_json: path_query_json.to_string_lossy().to_string(),
            path_models_json: path_models_json.to_string_lossy().to_string(),
            path_matches_hp: None,
            path_matches_mp: Some(mouse.path().to_string_lossy().to_string()),
            path_matches_zp: None,
            scoring_mode: ScoringModeArg::MultiCrossSpecies,
            max_results: None,
            num_threads: None,
            path_output: None,
        };
        let args_common = crate::common::Args {
            verbose: clap_verbosity_flag::Verbosity::new(0, 0),
        };
        let err = run(&args_common, &args).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PhenoError>(),
            Some(&PhenoError::MissingMatchTable(Organism::Human))
        );
        Ok(())
    }
}
