use std::path::PathBuf;
use std::time::Instant;

use clap::{ArgEnum, Parser, Subcommand};
use env_logger::{Builder, Env};
use log::{debug, error, info, LevelFilter};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

use heart_risk::error::{Error, Result};
use heart_risk::explore::{ColumnSummary, DatasetOverview};
use heart_risk::export::export_encoded;
use heart_risk::form::HEART_FORM;
use heart_risk::records::{
    read_records, read_requests, ChestPainType, ExerciseAngina, PatientRecord, RestingEcg, Sex,
    StSlope,
};
use heart_risk::report::{write_batch, ExploreReport, PredictionOutput};
use heart_risk::service::ServiceContext;
use heart_risk::training::{train, TrainingConfig};
use heart_risk::{TreeParams, UnseenCategoryPolicy};

static DATASET_PATH: &str = "data/heart.csv";
static MODEL_PATH: &str = "data/output/model_bundle.json";

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct HeartRiskArgs {
    #[clap(short, long, global = true, parse(from_occurrences), help = "Verbose level")]
    verbose: usize,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the encoder and decision tree and write the model bundle
    Train {
        #[clap(short, long, parse(from_os_str), env = "HEART_DATA", default_value = DATASET_PATH,
        help = "Training dataset")]
        data: PathBuf,
        #[clap(short, long, parse(from_os_str), env = "HEART_MODEL", default_value = MODEL_PATH,
        help = "Model bundle to write")]
        model: PathBuf,
        #[clap(long, parse(from_os_str),
        help = "Also write the encoded table (.csv or .parquet)")]
        encoded_out: Option<PathBuf>,
        #[clap(long, default_value_t = 0.1, help = "Fraction of rows held out for testing")]
        test_size: f32,
        #[clap(long, default_value_t = 50, help = "Seed of the train/test shuffle")]
        seed: u64,
        #[clap(long, help = "Split without shuffling")]
        no_shuffle: bool,
        #[clap(long, help = "Maximum tree depth (unbounded when omitted)")]
        max_depth: Option<u16>,
        #[clap(long, default_value_t = 2)]
        min_samples_split: usize,
        #[clap(long, default_value_t = 1)]
        min_samples_leaf: usize,
        #[clap(long, help = "Also run k-fold cross validation")]
        cv_folds: Option<usize>,
    },
    /// Predict heart-disease risk for one patient or a CSV of patients
    Predict {
        #[clap(short, long, parse(from_os_str), env = "HEART_MODEL", default_value = MODEL_PATH,
        help = "Model bundle")]
        model: PathBuf,
        #[clap(short, long, parse(from_os_str),
        help = "CSV of patients; the patient flags are ignored when set")]
        input: Option<PathBuf>,
        #[clap(short, long, parse(from_os_str), help = "Batch output CSV (stdout by default)")]
        output: Option<PathBuf>,
        #[clap(long, arg_enum, default_value = "reject",
        help = "Handling of categories absent from the training data")]
        unseen: UnseenCategoryPolicy,
        #[clap(short, long, arg_enum, default_value = "text")]
        format: OutputFormat,
        #[clap(flatten)]
        patient: PatientArgs,
    },
    /// Describe the dataset and print the chart series
    Explore {
        #[clap(short, long, parse(from_os_str), env = "HEART_DATA", default_value = DATASET_PATH,
        help = "Dataset")]
        data: PathBuf,
        #[clap(short, long, default_value_t = 5, help = "Rows to list")]
        rows: usize,
        #[clap(long, default_value_t = heart_risk::explore::DEFAULT_HISTOGRAM_BINS,
        help = "Age histogram bins")]
        bins: usize,
        #[clap(short, long, arg_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Print the input form schema as JSON
    Form,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, ArgEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
struct PatientArgs {
    #[clap(long, default_value_t = 40.0)]
    age: f64,
    #[clap(long, default_value = "M")]
    sex: Sex,
    #[clap(long, default_value = "ATA")]
    chest_pain_type: ChestPainType,
    #[clap(long, default_value_t = 120.0)]
    resting_bp: f64,
    #[clap(long, default_value_t = 200.0)]
    cholesterol: f64,
    #[clap(long, default_value_t = 0)]
    fasting_bs: u8,
    #[clap(long, default_value = "Normal")]
    resting_ecg: RestingEcg,
    #[clap(long, default_value_t = 150.0)]
    max_hr: f64,
    #[clap(long, default_value = "Y")]
    exercise_angina: ExerciseAngina,
    #[clap(long, default_value_t = 1.0)]
    oldpeak: f64,
    #[clap(long, default_value = "Up")]
    st_slope: StSlope,
}

impl From<PatientArgs> for PatientRecord {
    fn from(args: PatientArgs) -> Self {
        PatientRecord {
            age: args.age,
            sex: args.sex,
            chest_pain_type: args.chest_pain_type,
            resting_bp: args.resting_bp,
            cholesterol: args.cholesterol,
            fasting_bs: args.fasting_bs,
            resting_ecg: args.resting_ecg,
            max_hr: args.max_hr,
            exercise_angina: args.exercise_angina,
            oldpeak: args.oldpeak,
            st_slope: args.st_slope,
            heart_disease: None,
        }
    }
}

fn monitor_memory() -> u64 {
    let mut system = System::new();
    match get_current_pid() {
        Ok(pid) => {
            system.refresh_process(pid);
            system.process(pid).map(|p| p.memory()).unwrap_or(0)
        }
        Err(e) => {
            debug!("cannot read process memory: {}", e);
            0
        }
    }
}

async fn run_train(
    data: PathBuf,
    model: PathBuf,
    encoded_out: Option<PathBuf>,
    config: TrainingConfig,
) -> Result<()> {
    let start_time = Instant::now();
    let start_memory = monitor_memory();

    let records = read_records(&data)?;
    info!("training on {} rows from {:?}", records.len(), data);
    let (bundle, report) = train(&records, &config)?;
    bundle.save(&model).await?;

    if let Some(path) = encoded_out {
        export_encoded(&path, &bundle.encoder, &records)?;
    }

    match report.summary.test_accuracy {
        Some(accuracy) => println!(
            "Test accuracy: {:.4} ({} of {} rows held out)",
            accuracy, report.summary.test_rows, report.summary.rows
        ),
        None => println!("Trained on all {} rows", report.summary.rows),
    }
    if let Some(cv) = &report.cross_validation {
        println!(
            "{}-fold cross validation: train accuracy {:.4}, test accuracy {:.4}",
            cv.folds, cv.mean_train_accuracy, cv.mean_test_accuracy
        );
    }
    println!("Model bundle saved to {}", model.display());

    let end_memory = monitor_memory();
    info!("training took {:?}", start_time.elapsed());
    info!(
        "memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );
    Ok(())
}

async fn run_predict(
    model: PathBuf,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    policy: UnseenCategoryPolicy,
    format: OutputFormat,
    patient: PatientArgs,
) -> Result<()> {
    let ctx = ServiceContext::load(&model, policy).await?;

    if let Some(input) = input {
        let rows = read_requests(&input)?;
        let outcomes = ctx.assess_batch(&rows)?;
        let rejected = outcomes.iter().filter(|o| o.is_err()).count();
        if rejected > 0 {
            info!("{} of {} requests were rejected", rejected, rows.len());
        }
        match output {
            Some(path) => write_batch(std::fs::File::create(path)?, &rows, &outcomes)?,
            None => write_batch(std::io::stdout(), &rows, &outcomes)?,
        }
        return Ok(());
    }

    let record = PatientRecord::from(patient);
    let assessment = ctx.assess_request(&record)?;
    match format {
        OutputFormat::Text => {
            println!("Prediction: {}", assessment.verdict);
            println!("{}", assessment.verdict.message());
        }
        OutputFormat::Json => {
            let output = PredictionOutput::new(&assessment);
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_summary(summary: &[ColumnSummary]) {
    let cell = |v: Option<f64>| v.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string());
    println!(
        "{:<14}{:>8}{:>12}{:>12}{:>10}{:>10}{:>10}{:>10}{:>10}",
        "column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"
    );
    for s in summary {
        println!(
            "{:<14}{:>8}{:>12}{:>12}{:>10}{:>10}{:>10}{:>10}{:>10}",
            s.column,
            s.count,
            cell(s.mean),
            cell(s.std),
            cell(s.min),
            cell(s.q25),
            cell(s.median),
            cell(s.q75),
            cell(s.max)
        );
    }
}

fn run_explore(data: PathBuf, rows: usize, bins: usize, format: OutputFormat) -> Result<()> {
    let overview = DatasetOverview::read_csv(&data)?;
    let report = ExploreReport::build(&overview, rows, bins)?;

    match format {
        OutputFormat::Text => {
            println!("{}", overview.head(rows));
            print_summary(&report.summary);
            println!();
            for (value, count) in &report.chest_pain_counts {
                println!("ChestPainType {:<6}{}", value, count);
            }
            println!();
            for bin in &report.age_histogram {
                println!("Age {:>6.1} - {:>6.1}  {}", bin.lower, bin.upper, bin.count);
            }
            println!("{} age/cholesterol points", report.age_cholesterol.len());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

async fn heart_risk_app(cli: HeartRiskArgs) -> Result<()> {
    match cli.command {
        Command::Train {
            data,
            model,
            encoded_out,
            test_size,
            seed,
            no_shuffle,
            max_depth,
            min_samples_split,
            min_samples_leaf,
            cv_folds,
        } => {
            let config = TrainingConfig {
                test_size,
                shuffle: !no_shuffle,
                seed,
                cv_folds,
                tree: TreeParams {
                    max_depth,
                    min_samples_split,
                    min_samples_leaf,
                },
            };
            run_train(data, model, encoded_out, config).await
        }
        Command::Predict {
            model,
            input,
            output,
            unseen,
            format,
            patient,
        } => run_predict(model, input, output, unseen, format, patient).await,
        Command::Explore {
            data,
            rows,
            bins,
            format,
        } => run_explore(data, rows, bins, format),
        Command::Form => {
            println!("{}", serde_json::to_string_pretty(&*HEART_FORM)?);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Error> {
    let cli = HeartRiskArgs::parse();

    let log_level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let env = Env::new().filter("HEART_LOG");
    Builder::new()
        .filter(Some("heart_risk"), log_level)
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);

    match heart_risk_app(cli).await {
        Err(e) if e.is_validation() => {
            error!("invalid input: {}", e);
            std::process::exit(2);
        }
        other => other,
    }
}
