use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use divide_lm_core::{divide, ArpaModel, DivideConfig, LmConfig, Progress, Silent, Weight, EOS};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "divide_lm=info,divide_lm_core=info";

mod progress_bar;
use progress_bar::BarProgress;

#[derive(Parser)]
#[command(name = "divide-lm", version, about = "Weighted division of ARPA language models")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write `wnum * numerator - wden * denominator` as a new ARPA model
    Divide(DivideArgs),
    /// Print per-token scores of a sentence under one ARPA model
    Score(ScoreArgs),
}

#[derive(Args)]
struct DivideArgs {
    /// TOML job file; replaces the model, weight and output flags
    #[arg(long, conflicts_with_all = ["numerator", "denominator", "wnum", "wden", "output"])]
    config: Option<PathBuf>,

    /// Numerator ARPA model
    #[arg(long, required_unless_present = "config")]
    numerator: Option<PathBuf>,

    /// Log-probability of tokens unseen by the numerator
    #[arg(long, default_value_t = -100.0, allow_hyphen_values = true)]
    num_unk_logprob: f64,

    /// Log-backoff of tokens unseen by the numerator
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    num_unk_backoff: f64,

    /// Denominator ARPA model
    #[arg(long, required_unless_present = "config")]
    denominator: Option<PathBuf>,

    /// Log-probability of tokens unseen by the denominator
    #[arg(long, default_value_t = -100.0, allow_hyphen_values = true)]
    den_unk_logprob: f64,

    /// Log-backoff of tokens unseen by the denominator
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    den_unk_backoff: f64,

    /// Numerator weight (> 0)
    #[arg(long, required_unless_present = "config")]
    wnum: Option<f64>,

    /// Denominator weight (> 0)
    #[arg(long, required_unless_present = "config")]
    wden: Option<f64>,

    /// Output ARPA file
    #[arg(short, long, required_unless_present = "config")]
    output: Option<PathBuf>,

    /// Do not draw progress bars
    #[arg(long)]
    no_progress: bool,
}

impl DivideArgs {
    fn to_config(&self) -> Result<DivideConfig> {
        if let Some(path) = &self.config {
            return DivideConfig::load_toml(path)
                .with_context(|| format!("reading job file {}", path.display()));
        }
        // clap enforces these when --config is absent
        let numerator = self.numerator.clone().context("--numerator is required")?;
        let denominator = self.denominator.clone().context("--denominator is required")?;
        let wnum = self.wnum.context("--wnum is required")?;
        let wden = self.wden.context("--wden is required")?;
        let output = self.output.clone().context("--output is required")?;

        Ok(DivideConfig {
            weight_numerator: wnum,
            weight_denominator: wden,
            output: Some(output),
            return_model: false,
            numerator: LmConfig {
                model_path: numerator,
                unknown_weight: Weight::new(self.num_unk_logprob, self.num_unk_backoff),
            },
            denominator: LmConfig {
                model_path: denominator,
                unknown_weight: Weight::new(self.den_unk_logprob, self.den_unk_backoff),
            },
        })
    }
}

#[derive(Args)]
struct ScoreArgs {
    /// ARPA model to score with
    #[arg(long)]
    model: PathBuf,

    /// Log-probability of unseen tokens
    #[arg(long, default_value_t = -100.0, allow_hyphen_values = true)]
    unk_logprob: f64,

    /// Do not prepend <s>
    #[arg(long)]
    no_bos: bool,

    /// Do not append </s>
    #[arg(long)]
    no_eos: bool,

    /// Sentence to score, whitespace separated
    sentence: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Divide(args) => run_divide(&args),
        Command::Score(args) => run_score(&args),
    }
}

/// `RUST_LOG` when set and valid, the crate defaults otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn run_divide(args: &DivideArgs) -> Result<()> {
    let config = args.to_config()?;
    let mut bar = BarProgress::new();
    let mut silent = Silent;
    let progress: &mut dyn Progress = if args.no_progress {
        &mut silent
    } else {
        &mut bar
    };

    divide(&config, progress).context("divide failed")?;
    if let Some(output) = &config.output {
        tracing::info!("divided model written to {}", output.display());
    }
    Ok(())
}

fn run_score(args: &ScoreArgs) -> Result<()> {
    let model = ArpaModel::load(&args.model, Weight::with_prob(args.unk_logprob))
        .with_context(|| format!("loading {}", args.model.display()))?;
    let (rows, total) = score_report(&model, &args.sentence, !args.no_bos, !args.no_eos);
    for (token, score) in rows {
        println!("{}\t{}", token, score);
    }
    println!("total\t{}", total);
    Ok(())
}

/// Per-token scores labelled with their token, and the sentence total.
fn score_report<'a>(
    model: &ArpaModel,
    sentence: &'a str,
    bos: bool,
    eos: bool,
) -> (Vec<(&'a str, f64)>, f64) {
    let mut tokens: Vec<&str> = sentence.split_whitespace().collect();
    if eos {
        tokens.push(EOS);
    }
    let rows = tokens
        .into_iter()
        .zip(model.full_scores(sentence, bos, eos))
        .collect();
    (rows, model.sentence_score(sentence, bos, eos))
}
