use crate::cli::SourceArgs;
use crate::infra::{read_json_file, MethodologySource};
use clap::Args;
use screening::classification::{load_entities_from_path, ClassificationReport, Entity};
use screening::config::AppConfig;
use screening::error::AppError;
use screening::methodology::{CompiledCondition, CriterionValue, RuleDeletion, RuleEdit, RuleKey};
use screening::session::{BatchPolicy, MethodologySession};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

const DEMO_STEP: &str = "passes_negative_screening";
const DEMO_CATEGORY: &str = "principal_adverse_impacts";

#[derive(Args, Debug, Default)]
pub(crate) struct MethodologyArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ScreenArgs {
    #[command(flatten)]
    pub(crate) source: SourceArgs,
    /// JSON array of rule edits to apply before classifying
    #[arg(long)]
    pub(crate) edits: Option<PathBuf>,
    /// Previously saved methodology instance (JSON) to start from
    #[arg(long)]
    pub(crate) instance: Option<PathBuf>,
    /// Entities to classify (.csv or .json)
    #[arg(long)]
    pub(crate) entities: PathBuf,
    /// Apply the valid edits and report the rest instead of rejecting the batch
    #[arg(long)]
    pub(crate) skip_invalid: bool,
    /// Maximum entities evaluated at once (defaults to SCREENING_CONCURRENCY)
    #[arg(long)]
    pub(crate) concurrency: Option<usize>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Classify these entities (.csv or .json) instead of the sample portfolio
    #[arg(long)]
    pub(crate) entities: Option<PathBuf>,
}

pub(crate) fn run_methodology(args: MethodologyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let root = MethodologySource::from_config(&config.screening)
        .overridden_by(args.source.template, args.source.params)
        .load()?;

    println!("{}", serde_json::to_string_pretty(&root)?);
    Ok(())
}

pub(crate) async fn run_screen(args: ScreenArgs) -> Result<(), AppError> {
    let ScreenArgs {
        source,
        edits,
        instance,
        entities,
        skip_invalid,
        concurrency,
    } = args;

    let config = AppConfig::load()?;
    let root = MethodologySource::from_config(&config.screening)
        .overridden_by(source.template, source.params)
        .load()?;
    let root = Arc::new(root);

    let session = match instance {
        Some(path) => MethodologySession::with_instance(root, read_json_file(&path)?)?,
        None => MethodologySession::new(root),
    };
    let mut session =
        session.with_concurrency(concurrency.unwrap_or(config.screening.concurrency));

    if let Some(path) = edits {
        let edits: Vec<RuleEdit> = read_json_file(&path)?;
        let policy = if skip_invalid {
            BatchPolicy::Skip
        } else {
            BatchPolicy::Abort
        };
        let batch = session.apply_batch(&edits, policy)?;
        for rejected in &batch.rejected {
            eprintln!("edit {} skipped: {}", rejected.index, rejected.error);
        }
    }

    let entities = load_entities_from_path(&entities)?;
    let report = session.classify(entities).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let root = Arc::new(MethodologySource::from_config(&config.screening).load()?);
    let mut session =
        MethodologySession::new(root).with_concurrency(config.screening.concurrency);

    println!("Methodology screening demo");
    println!(
        "Root methodology {} with {} rules",
        session.root().version(),
        session.root().rules().count()
    );

    for edit in demo_edits() {
        let outcome = session.add_rule(&edit)?;
        println!(
            "- {} {} {} -> {:?}",
            edit.rule.rule_code,
            edit.value.code,
            edit.value.operator,
            outcome
        );
    }

    let conditions = session.compile();
    render_conditions(&conditions);

    let entities = match args.entities {
        Some(path) => load_entities_from_path(&path)?,
        None => sample_entities(),
    };
    let report = session.classify(entities.clone()).await;
    render_report(&report);

    let deletion = RuleDeletion::new(threshold_rule(), "scope_1_emissions");
    session.delete_rule(&deletion)?;
    println!("\nAfter removing the scope 1 emissions threshold");
    let report = session.classify(entities).await;
    render_report(&report);

    Ok(())
}

fn threshold_rule() -> RuleKey {
    RuleKey::new(DEMO_STEP, DEMO_CATEGORY, "pais_upon_threshold")
}

fn demo_edits() -> Vec<RuleEdit> {
    vec![
        RuleEdit::new(
            RuleKey::new(DEMO_STEP, DEMO_CATEGORY, "pais_excluded"),
            "activities_affecting_biodiversity",
            "equal",
            Some(CriterionValue::Boolean(false)),
        ),
        RuleEdit::new(
            threshold_rule(),
            "scope_1_emissions",
            "less",
            Some(CriterionValue::Number(60.0)),
        ),
    ]
}

fn sample_entities() -> Vec<Entity> {
    let entity = |id: &str, biodiversity: Value, scope_1: Value| {
        Entity::new(id)
            .with_field("activities_affecting_biodiversity", biodiversity)
            .with_field("scope_1_emissions", scope_1)
    };

    vec![
        entity("FR0000120271", Value::Bool(false), Value::from(40)),
        entity("US0378331005", Value::Bool(true), Value::from(40)),
        entity("NL0011821202", Value::Bool(false), Value::Null),
        entity("DE0007164600", Value::Bool(false), Value::from(72.5)),
    ]
}

fn render_conditions(conditions: &[CompiledCondition]) {
    println!("\nCompiled conditions");
    for condition in conditions {
        let value = condition
            .value
            .as_ref()
            .and_then(|value| serde_json::to_string(value).ok())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  - {}.{} {} {} (from '{}')",
            condition.fact, condition.code, condition.operator, value, condition.original_operator
        );
    }
}

fn render_report(report: &ClassificationReport) {
    let totals = report.totals();
    println!(
        "\nClassification (methodology {}, {})",
        report.methodology_version,
        report.evaluated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "- {} pass | {} not pass | {} without data | {} failed",
        totals.pass, totals.not_pass, totals.none, totals.failed
    );

    for (code, entries) in &report.classifications {
        println!("  {code}:");
        if entries.is_empty() {
            println!("    (none)");
        }
        for entry in entries {
            let detail = entry
                .not_pass_conditions
                .iter()
                .map(|condition| format!("fails {}", condition.code))
                .chain(
                    entry
                        .inapplicable_conditions
                        .iter()
                        .map(|condition| format!("no data for {}", condition.code)),
                )
                .collect::<Vec<_>>();
            if detail.is_empty() {
                println!("    - {}", entry.entity.id);
            } else {
                println!("    - {} ({})", entry.entity.id, detail.join(", "));
            }
        }
    }

    for failure in &report.failures {
        println!("  ! {}: {}", failure.entity_id, failure.reason);
    }
}
