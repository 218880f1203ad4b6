use clap::{Parser, Subcommand};
use proxy_sheet::imaging::DecodingLoader;
use proxy_sheet::thumbs::ThumbnailCache;
use proxy_sheet::{config, job, logging, output, print};
use std::path::PathBuf;

/// Shared flags for commands that take a job.
#[derive(clap::Args, Clone)]
struct JobArgs {
    /// Card images, or folders whose images are all added
    inputs: Vec<PathBuf>,

    /// Job list file, one `[qty[x]] path` entry per line
    #[arg(long, value_name = "FILE")]
    list: Option<PathBuf>,

    /// Copies of each image given as an input (list entries keep their own)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    copies: u32,
}

#[derive(Parser)]
#[command(name = "proxy-sheet")]
#[command(about = "Lay out card images 3x3 on printable PDF pages")]
#[command(long_about = "\
Lay out card images 3x3 on printable PDF pages

Every card is resampled to its exact physical size, placed edge to edge with
no gutter, and the 3x3 block is centered on the page. Nine cards per page;
the last page may be partly filled.

Job list format (--list):

  # whole-line comments start with # or //
  4 cards/lightning-bolt.png     // four copies
  2x cards/counterspell.jpg      // 'x' after the quantity is optional
  cards/island.png               // no quantity = one copy
  3 cards/tokens/                // a folder: three of each image in it

Relative paths resolve against the list file's directory. Unreadable images
leave their slot blank and are reported; they never abort the run.

Run 'proxy-sheet gen-config' to generate a documented proxy-sheet.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./proxy-sheet.toml when present)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Resolution in dots per inch (overrides config)
    #[arg(long, value_name = "DPI", global = true)]
    dpi: Option<u32>,

    /// Paper size in millimetres, e.g. 210x297 (overrides config)
    #[arg(long, value_name = "WxH", value_parser = config::parse_size, global = true)]
    page_size: Option<[f64; 2]>,

    /// Card size in millimetres, e.g. 63x88 (overrides config)
    #[arg(long, value_name = "WxH", value_parser = config::parse_size, global = true)]
    card_size: Option<[f64; 2]>,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compose the job and write the PDF
    Build {
        #[command(flatten)]
        job: JobArgs,

        /// Destination PDF
        #[arg(short, long, value_name = "OUT.pdf")]
        output: PathBuf,
    },
    /// Show geometry and slot assignment without decoding images
    Plan {
        #[command(flatten)]
        job: JobArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Decode every distinct image once and report unreadable ones
    Check {
        #[command(flatten)]
        job: JobArgs,
    },
    /// Print a stock proxy-sheet.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose, cli.quiet);

    let overrides = config::Overrides {
        page_size: cli.page_size,
        card_size: cli.card_size,
        resolution: cli.dpi,
    };

    match cli.command {
        Command::Build { job: args, output: dest } => {
            let sheet = config::load_config(cli.config.as_deref(), &overrides)?;
            let items = collect_items(&args)?;
            init_thread_pool(&sheet.processing);

            let quiet = cli.quiet;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    if quiet {
                        continue;
                    }
                    for line in output::format_print_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let result = print::print_job(
                &DecodingLoader::new(),
                &job::expand(&items),
                &sheet,
                &dest,
                Some(&tx),
            );
            drop(tx);
            printer.join().map_err(|_| "progress printer panicked")?;
            let summary = result?;
            if !quiet {
                output::print_print_summary(&summary);
            }
        }
        Command::Plan { job: args, json } => {
            let sheet = config::load_config(cli.config.as_deref(), &overrides)?;
            let items = collect_items(&args)?;
            let plan = print::plan_job(&job::expand(&items), &sheet.to_geometry());
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                output::print_plan(&plan);
            }
        }
        Command::Check { job: args } => {
            let items = collect_items(&args)?;
            let mut cache = ThumbnailCache::new(DecodingLoader::new());
            let report = print::check_job(&mut cache, &job::expand(&items));
            output::print_check(&report);
            let failures = report.failures().count();
            if failures > 0 {
                return Err(format!("{failures} unreadable image(s)").into());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// List file entries first, then positional inputs, in the order given.
fn collect_items(args: &JobArgs) -> Result<Vec<job::JobItem>, job::JobError> {
    let mut items = match &args.list {
        Some(path) => job::load_job_list(path)?,
        None => Vec::new(),
    };
    items.extend(job::items_from_inputs(&args.inputs, args.copies)?);
    Ok(items)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
