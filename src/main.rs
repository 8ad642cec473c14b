use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use crftag::{Dataset, Evaluation, Model, Result, Sequence, Tagged, Tagger};
use serde::Serialize;

/// Label sequences with a CRFsuite model.
#[derive(Debug, Parser)]
#[command(name = "crftag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Assign suitable labels to the instances in the data set given by a file (FILE).
    /// If FILE is omitted or '-', data is read from STDIN.
    Tag(TagArgs),
    /// Output the model stored in the file (MODEL) in a plain-text format
    Dump {
        /// read a model from a file (MODEL)
        #[arg(short, long, value_name = "MODEL")]
        model: PathBuf,
    },
}

#[derive(Debug, Args)]
struct TagArgs {
    /// read a model from a file (MODEL)
    #[arg(short, long, value_name = "MODEL")]
    model: PathBuf,
    /// report the performance of the model on the data
    #[arg(short = 't', long = "test")]
    evaluate: bool,
    /// output the reference labels in the input data
    #[arg(short, long)]
    reference: bool,
    /// output the probability of the label sequences
    #[arg(short, long)]
    probability: bool,
    /// output the marginal probability of items for their predicted label
    #[arg(short = 'i', long)]
    marginal: bool,
    /// suppress tagging results (useful for test mode)
    #[arg(short, long)]
    quiet: bool,
    /// print one JSON object per sequence
    #[arg(long)]
    json: bool,
    #[arg(value_name = "FILE")]
    datasets: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Record<'a> {
    labels: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marginals: Option<&'a [f64]>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::info!("{:?}", cli);
    match cli.command {
        Command::Tag(args) => tag(&args),
        Command::Dump { model } => {
            let model = Model::from_file(&model)?;
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            model.dump(&mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

fn read_datasets(paths: &[PathBuf]) -> Result<Dataset> {
    if paths.is_empty() || paths.iter().all(|p| p.as_os_str() == "-") {
        return Ok(Dataset::read(io::stdin().lock())?);
    }
    let mut dataset = Dataset::default();
    for path in paths {
        let ds = if path.as_os_str() == "-" {
            Dataset::read(io::stdin().lock())?
        } else {
            Dataset::from_file(path)?
        };
        log::debug!("{}: {} sequences", path.display(), ds.len());
        dataset.seqs.extend(ds.seqs);
    }
    Ok(dataset)
}

fn tag(args: &TagArgs) -> Result<()> {
    let model = Model::from_file(&args.model)?;
    let tagger = model.tagger();
    let dataset = read_datasets(&args.datasets)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut evaluation = Evaluation::new(model.num_labels());
    let begin = Instant::now();
    for seq in &dataset.seqs {
        output(&mut out, args, &tagger, seq, &mut evaluation)?;
    }
    if args.evaluate {
        let elapsed = begin.elapsed().as_secs_f64();
        evaluation.evaluate();
        write!(out, "{}", evaluation)?;
        let rate = if elapsed > 0.0 {
            dataset.len() as f64 / elapsed
        } else {
            0.0
        };
        writeln!(out, "Elapsed time: {:.6} [sec] ({:.1} [instance/sec])", elapsed, rate)?;
    }
    out.flush()?;
    Ok(())
}

fn output<W: Write>(
    out: &mut W,
    args: &TagArgs,
    tagger: &Tagger<'_>,
    seq: &Sequence,
    evaluation: &mut Evaluation,
) -> Result<()> {
    let instance = tagger.encode(&seq.items);
    let tagged = if args.probability || args.marginal {
        tagger.decode_with_marginals(&instance)?
    } else {
        Tagged {
            labels: tagger.decode(&instance)?,
            probability: 1.0,
            marginals: Vec::new(),
        }
    };
    if args.evaluate {
        evaluation.accumulate(&seq.labels, &tagged.labels);
    }
    if args.quiet {
        return Ok(());
    }

    if args.json {
        let record = Record {
            labels: &tagged.labels,
            reference: args.reference.then_some(seq.labels.as_slice()),
            probability: args.probability.then_some(tagged.probability),
            marginals: args.marginal.then_some(tagged.marginals.as_slice()),
        };
        serde_json::to_writer(&mut *out, &record).map_err(io::Error::from)?;
        writeln!(out)?;
        return Ok(());
    }

    if args.probability {
        writeln!(out, "@probability\t{:.6}", tagged.probability)?;
    }
    for (t, label) in tagged.labels.iter().enumerate() {
        if args.reference {
            write!(out, "{}\t", seq.labels[t])?;
        }
        write!(out, "{}", label)?;
        if args.marginal {
            write!(out, ":{:.6}", tagged.marginals[t])?;
        }
        writeln!(out)?;
    }
    writeln!(out)?;
    Ok(())
}
