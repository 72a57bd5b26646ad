//! surrogate-tests - run surrogate significance tests on synthetic data
//!
//! Usage:
//!   surrogate-tests coherence --null-mode all     # Band coherence vs surrogate nulls
//!   surrogate-tests hysteresis --noise 0.1        # Forward/backward band sweep
//!   surrogate-tests long-return --inject-echo     # Tail autocorrelation vs block null
//!   surrogate-tests aggregate --csv               # Summarize saved runs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use surrogate_coherence::generators::{
    binary_events, coupled_narrowband_pair, white_noise_pair, CoupledPairConfig, EchoConfig,
    GeneratorConfig,
};
use surrogate_coherence::records::{RecordSet, ResultRecord};
use surrogate_coherence::summary::{coherence_csv, hysteresis_csv, long_return_csv, render_report};
use surrogate_coherence::{
    run_coherence_test, run_long_return_test, sweep_hysteresis, CoherenceTestConfig,
    CrossingDetector, FrequencyBand, HysteresisConfig, LongReturnConfig, NullModel, ReductionMode,
    SegmentPolicy, SweepTarget,
};

const TASK_DIRS: [&str; 3] = ["coherence", "hysteresis", "long-return"];

#[derive(Parser)]
#[command(name = "surrogate-tests")]
#[command(about = "Surrogate-based significance tests for coherence, hysteresis and long-range recurrence")]
#[command(version)]
struct Cli {
    /// Root directory for saved records
    #[arg(long, global = true, default_value = "results")]
    out_dir: PathBuf,

    /// Run tag; records go to <out-dir>/<tag>/<task>/
    #[arg(long, global = true, default_value = "default")]
    tag: String,

    /// Print the record without saving it
    #[arg(long, global = true)]
    no_save: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Test band coherence of a synthetic pair against surrogate nulls
    Coherence {
        /// Series length
        #[arg(long, default_value_t = 4096)]
        n: usize,

        /// Surrogate draws per null family
        #[arg(long, default_value_t = 300)]
        n_null: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// flip, phase, shift, both or all
        #[arg(long, default_value = "all")]
        null_mode: NullModel,

        #[arg(long, default_value_t = 0.7)]
        band_min: f64,

        #[arg(long, default_value_t = 0.9)]
        band_max: f64,

        /// Welch segment length, 0 for automatic
        #[arg(long, default_value_t = 0)]
        nperseg: usize,

        /// mean, peak or trimmed-mean[:fraction]
        #[arg(long, default_value = "mean")]
        mode: ReductionMode,

        #[arg(long, default_value_t = 20.0)]
        fs: f64,

        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        /// Noise level on the second series of the coupled pair
        #[arg(long, default_value_t = 0.30)]
        snr_y: f64,

        /// Minimum circular shift as a fraction of the length
        #[arg(long, default_value_t = 0.1)]
        shift_min_frac: f64,

        /// Use two independent white-noise series instead of a coupled pair
        #[arg(long)]
        white: bool,
    },

    /// Sweep a band edge up and back down and measure the loop
    Hysteresis {
        #[arg(long, default_value_t = 300)]
        n: usize,

        #[arg(long, default_value_t = 0.5)]
        u_min: f64,

        #[arg(long, default_value_t = 1.0)]
        u_max: f64,

        #[arg(long, default_value_t = 21)]
        n_steps: usize,

        /// Std of observation noise added at each evaluation
        #[arg(long, default_value_t = 0.0)]
        noise: f64,

        /// low_edge, high_edge or width
        #[arg(long, default_value = "low_edge")]
        sweep: SweepTarget,

        /// midpoint or gradient
        #[arg(long, default_value = "midpoint")]
        crossing: CrossingDetector,

        #[arg(long, default_value_t = 128)]
        nperseg: usize,

        #[arg(long, default_value = "mean")]
        mode: ReductionMode,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Test tail autocorrelation of an event series against a block null
    LongReturn {
        #[arg(long, default_value_t = 5000)]
        n: usize,

        #[arg(long, default_value_t = 200)]
        max_lag: usize,

        #[arg(long, default_value_t = 200)]
        n_null: usize,

        /// Block length, default max(5, max_lag / 10)
        #[arg(long)]
        block_size: Option<usize>,

        /// Base event probability
        #[arg(long, default_value_t = 0.05)]
        rate: f64,

        /// Add a periodic echo to the event series
        #[arg(long)]
        inject_echo: bool,

        #[arg(long, default_value_t = 250)]
        echo_every: usize,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },

    /// Summarize every saved record under <out-dir>/<tag>
    Aggregate {
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        /// Also write summary_<task>.csv files next to the records
        #[arg(long)]
        csv: bool,
    },
}

fn timestamp() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

fn save_record(root: &Path, record: &ResultRecord, seed: u64, json: &str) -> Result<PathBuf> {
    let dir = root.join(record.task());
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("{}-seed{}.json", timestamp(), seed));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

fn load_records(root: &Path) -> Result<RecordSet> {
    let mut set = RecordSet::default();
    for task in TASK_DIRS {
        let dir = root.join(task);
        if !dir.is_dir() {
            continue;
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)
            .with_context(|| format!("reading {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        for path in paths {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            match ResultRecord::from_json(&text) {
                Ok(record) => set.push(record),
                Err(e) => log::warn!("skipping {}: {}", path.display(), e),
            }
        }
    }
    Ok(set)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let root = cli.out_dir.join(&cli.tag);

    let (record, seed) = match cli.command {
        Commands::Coherence {
            n,
            n_null,
            seed,
            null_mode,
            band_min,
            band_max,
            nperseg,
            mode,
            fs,
            alpha,
            snr_y,
            shift_min_frac,
            white,
        } => {
            let generator = GeneratorConfig {
                length: n,
                seed,
                sampling_frequency: fs,
            };
            let (x, y) = if white {
                white_noise_pair(&generator)?
            } else {
                let coupling = CoupledPairConfig {
                    snr_y,
                    ..CoupledPairConfig::default()
                };
                coupled_narrowband_pair(&generator, &coupling)?
            };

            let config = CoherenceTestConfig::builder()
                .fs(fs)
                .band(FrequencyBand::new(band_min, band_max)?)
                .segment_policy(SegmentPolicy::from_cli_value(nperseg))
                .null_model(null_mode)
                .n_null(n_null)
                .reduction(mode)
                .shift_min_frac(shift_min_frac)
                .alpha(alpha)
                .seed(seed)
                .build()?;
            let result = run_coherence_test(&x, &y, &config)?;
            (ResultRecord::coherence(config, result), seed)
        }

        Commands::Hysteresis {
            n,
            u_min,
            u_max,
            n_steps,
            noise,
            sweep,
            crossing,
            nperseg,
            mode,
            seed,
        } => {
            let config = HysteresisConfig {
                u_min,
                u_max,
                n_steps,
                noise,
                sweep,
                crossing,
                segment_policy: SegmentPolicy::from_cli_value(nperseg),
                reduction: mode,
                seed,
                ..HysteresisConfig::default()
            };
            let generator = GeneratorConfig {
                length: n,
                seed,
                sampling_frequency: config.fs,
            };
            let (x, y) = coupled_narrowband_pair(&generator, &CoupledPairConfig::default())?;
            let result = sweep_hysteresis(&x, &y, &config)?;
            (ResultRecord::hysteresis(config, result), seed)
        }

        Commands::LongReturn {
            n,
            max_lag,
            n_null,
            block_size,
            rate,
            inject_echo,
            echo_every,
            seed,
        } => {
            let generator = GeneratorConfig {
                length: n,
                seed,
                ..GeneratorConfig::default()
            };
            let echo = EchoConfig {
                every: echo_every,
                ..EchoConfig::default()
            };
            let series = binary_events(&generator, rate, inject_echo.then_some(&echo))?;
            let config = LongReturnConfig {
                max_lag,
                n_null,
                block_size,
                seed,
                ..LongReturnConfig::default()
            };
            let result = run_long_return_test(&series, &config)?;
            (ResultRecord::long_return(config, result), seed)
        }

        Commands::Aggregate { alpha, csv } => {
            if !root.is_dir() {
                bail!("no records under {}", root.display());
            }
            let set = load_records(&root)?;
            let report = render_report(
                Some(&cli.tag),
                &set.coherence,
                &set.hysteresis,
                &set.long_return,
                alpha,
            )?;
            print!("{}", report);

            if csv {
                let tables = [
                    ("coherence", coherence_csv(&set.coherence)?, set.coherence.len()),
                    ("hysteresis", hysteresis_csv(&set.hysteresis)?, set.hysteresis.len()),
                    ("long-return", long_return_csv(&set.long_return)?, set.long_return.len()),
                ];
                for (task, table, rows) in tables {
                    if rows == 0 {
                        continue;
                    }
                    let path = root.join(format!("summary_{}.csv", task));
                    fs::write(&path, table).with_context(|| format!("writing {}", path.display()))?;
                    println!("wrote {}", path.display());
                }
            }
            return Ok(());
        }
    };

    let json = record.to_json()?;
    println!("{}", json);
    if !cli.no_save {
        let path = save_record(&root, &record, seed, &json)?;
        log::info!("saved {}", path.display());
    }
    Ok(())
}
