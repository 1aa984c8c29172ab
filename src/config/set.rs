use crate::MemSampler;
use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command, ValueEnum};
use csv::Writer;
use rand::distributions::{Uniform, WeightedIndex};
use std::fmt;
use std::fs::{create_dir_all, File, OpenOptions};
use std::path::Path;
use std::time::Duration;

#[derive(PartialEq, Debug, ValueEnum, Clone)]
pub enum DS {
    List,
}

pub enum OpsPerCs {
    One,
    Four,
}

impl fmt::Display for OpsPerCs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpsPerCs::One => write!(f, "1"),
            OpsPerCs::Four => write!(f, "4"),
        }
    }
}

#[derive(PartialEq, Debug)]
pub enum Op {
    Contains,
    Add,
    Remove,
}

impl Op {
    pub const OPS: [Op; 3] = [Op::Contains, Op::Add, Op::Remove];
}

#[derive(Clone, Copy, PartialEq)]
pub enum ContainsRate {
    WriteOnly = 0,
    ReadWrite = 1,
    ReadIntensive = 2,
    ReadOnly = 3,
}

pub struct Config {
    pub ds: DS,
    pub threads: usize,

    pub aux_thread: usize,
    pub aux_thread_period: Duration,
    pub non_coop: u8,
    pub non_coop_period: Duration,
    pub sampling: bool,
    pub sampling_period: Duration,

    pub contains_rate: ContainsRate,
    pub op_dist: WeightedIndex<i32>,
    pub key_dist: Uniform<usize>,
    pub prefill: usize,
    pub key_range: usize,
    pub interval: u64,
    pub duration: Duration,
    pub ops_per_cs: OpsPerCs,

    pub mem_sampler: MemSampler,
}

impl Config {
    fn ds_name(&self) -> String {
        self.ds
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} threads, n{}, c{}, g{}, r{}",
            self.ds_name(),
            self.threads,
            self.non_coop,
            self.ops_per_cs,
            self.contains_rate as u8,
            self.key_range,
        )
    }
}

pub struct BenchWriter {
    output: Option<Writer<File>>,
}

#[derive(Clone)]
pub struct Perf {
    pub ops_per_sec: u64,
    pub peak_mem: usize,
    pub avg_mem: usize,
}

impl fmt::Display for Perf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ops/s: {}, peak mem: {}, avg_mem: {}",
            self.ops_per_sec,
            readable_bytes(self.peak_mem),
            readable_bytes(self.avg_mem),
        )
    }
}

fn readable_bytes(num: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    for (i, unit) in UNITS.iter().enumerate() {
        if num / 2usize.pow(i as u32 * 10) < 1000 {
            return format!("{:.3} {}", num as f64 / 2f64.powf(i as f64 * 10.0), unit);
        }
    }
    format!(
        "{:.3} {}",
        num as f64 / 2f64.powf((UNITS.len() - 1) as f64 * 10.0),
        UNITS[UNITS.len() - 1]
    )
}

const HEADER: [&str; 10] = [
    "ds",
    "threads",
    "sampling_period",
    "non_coop",
    "contains_rate",
    "ops_per_cs",
    "throughput",
    "peak_mem",
    "avg_mem",
    "key_range",
];

impl BenchWriter {
    pub fn write_record(self, config: &Config, perf: &Perf) -> anyhow::Result<()> {
        if let Some(mut output) = self.output {
            output.write_record(&[
                config.ds_name(),
                config.threads.to_string(),
                config.sampling_period.as_millis().to_string(),
                config.non_coop.to_string(),
                (config.contains_rate as u8).to_string(),
                config.ops_per_cs.to_string(),
                perf.ops_per_sec.to_string(),
                perf.peak_mem.to_string(),
                perf.avg_mem.to_string(),
                config.key_range.to_string(),
            ])?;
            output.flush()?;
        }
        Ok(())
    }
}

fn open_output(output_name: &str) -> anyhow::Result<Writer<File>> {
    let output_path = Path::new(output_name);
    if let Some(dir) = output_path.parent() {
        create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    if let Ok(f) = OpenOptions::new().read(true).append(true).open(output_path) {
        return Ok(csv::Writer::from_writer(f));
    }

    let f = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output_path)
        .with_context(|| format!("opening {}", output_path.display()))?;
    let mut output = csv::Writer::from_writer(f);
    // NOTE: `write_record` on `bench`
    output.write_record(HEADER)?;
    output.flush()?;
    Ok(output)
}

pub fn command(name: String) -> Command {
    Command::new(name)
        .arg(
            Arg::new("data structure")
                .short('d')
                .value_parser(value_parser!(DS))
                .ignore_case(true)
                .default_value("list")
                .help("Data structure"),
        )
        .arg(
            Arg::new("threads")
                .short('t')
                .value_parser(value_parser!(usize))
                .required(true)
                .help("Numbers of threads to run."),
        )
        .arg(
            Arg::new("non-coop")
                .short('n')
                .help(
                    "The degree of non-cooperation of an auxiliary pinned thread. \
                     1: 1ms, 2: 10ms, 3: stall",
                )
                .value_parser(value_parser!(u8).range(0..4))
                .default_value("0"),
        )
        .arg(
            Arg::new("contains rate")
                .short('g')
                .help(
                    "The proportion of `contains` operations. \
                     0: 0%, 1: 50%, 2: 90%, 3: 100%",
                )
                .value_parser(value_parser!(u8).range(0..4))
                .default_value("0"),
        )
        .arg(
            Arg::new("range")
                .short('r')
                .value_parser(value_parser!(usize))
                .help("Key range: [0..RANGE]")
                .default_value("1000"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .value_parser(value_parser!(u64).range(1..))
                .help("Time interval in seconds to run the benchmark")
                .default_value("10"),
        )
        .arg(
            Arg::new("sampling period")
                .short('s')
                .value_parser(value_parser!(u64))
                .help(
                    "The period to query jemalloc stats.allocated (ms). 0 for no sampling. \
                     Only supported on linux.",
                )
                .default_value("1"),
        )
        .arg(
            Arg::new("ops per cs")
                .short('c')
                .value_parser(["1", "4"])
                .help("Operations per each critical section")
                .default_value("1"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .help("Output CSV filename. Appends the data if the file already exists."),
        )
        .arg(
            Arg::new("dry run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Check whether the arguments are parsable, without running a benchmark"),
        )
}

/// Parses the command line. Returns `None` on `--dry-run`.
pub fn setup(name: String) -> anyhow::Result<Option<(Config, BenchWriter)>> {
    let m = command(name).get_matches();

    let ds = m
        .get_one::<DS>("data structure")
        .cloned()
        .context("missing data structure")?;
    let threads = *m.get_one::<usize>("threads").context("missing threads")?;
    let non_coop = *m.get_one::<u8>("non-coop").context("missing non-coop")?;
    let contains_rate = match m.get_one::<u8>("contains rate").copied() {
        Some(0) => ContainsRate::WriteOnly,
        Some(1) => ContainsRate::ReadWrite,
        Some(2) => ContainsRate::ReadIntensive,
        Some(3) => ContainsRate::ReadOnly,
        _ => unreachable!("contains_rate is invalid"),
    };
    let key_range = *m.get_one::<usize>("range").context("missing range")?;
    anyhow::ensure!(key_range > 0, "key range must not be empty");
    let prefill = key_range / 2;
    let key_dist = Uniform::from(0..key_range);
    let interval = *m.get_one::<u64>("interval").context("missing interval")?;
    let sampling_period = *m
        .get_one::<u64>("sampling period")
        .context("missing sampling period")?;
    let sampling = sampling_period > 0 && cfg!(target_os = "linux");
    let ops_per_cs = match m.get_one::<String>("ops per cs").map(String::as_str) {
        Some("1") => OpsPerCs::One,
        Some("4") => OpsPerCs::Four,
        _ => unreachable!("ops_per_cs should be one or four"),
    };
    let duration = Duration::from_secs(interval);

    let op_weights = match contains_rate {
        ContainsRate::WriteOnly => &[0, 1, 1],
        ContainsRate::ReadWrite => &[2, 1, 1],
        ContainsRate::ReadIntensive => &[18, 1, 1],
        ContainsRate::ReadOnly => &[1, 0, 0],
    };
    let op_dist = WeightedIndex::new(op_weights)?;

    if m.get_flag("dry run") {
        return Ok(None);
    }

    let output = m
        .get_one::<String>("output")
        .map(|name| open_output(name.as_str()))
        .transpose()?;
    let mem_sampler = MemSampler::new()?;
    let config = Config {
        ds,
        threads,

        aux_thread: if sampling || non_coop > 0 { 1 } else { 0 },
        aux_thread_period: Duration::from_millis(1),
        non_coop,
        non_coop_period: match non_coop {
            1 => Duration::from_millis(1),
            2 => Duration::from_millis(10),
            // No repin if -n0 or -n3
            _ => Duration::from_secs(interval),
        },
        sampling,
        sampling_period: Duration::from_millis(sampling_period),

        contains_rate,
        op_dist,
        key_dist,
        prefill,
        key_range,
        interval,
        duration,
        ops_per_cs,

        mem_sampler,
    };

    Ok(Some((config, BenchWriter { output })))
}
