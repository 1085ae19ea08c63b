#![allow(deprecated)] // zipf::ZipfDistribution

#[macro_use]
extern crate clap;

use clap::{App, Arg};
use clist::{check, IntList, IntSet, SimpleSet};
use rand::distributions::Distribution;
use std::process;
use std::sync::Arc;
use std::thread;
use std::time;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;
use zipf::ZipfDistribution;

#[derive(Clone, Copy, Debug)]
enum Workload {
    Insert,
    InsertDupl,
    InsertContains,
    Mixed,
}

impl Workload {
    const NAMES: &'static [&'static str] = &["insert", "insert-dupl", "30i-70c", "1d-9i-90c"];

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "insert" => Some(Workload::Insert),
            "insert-dupl" => Some(Workload::InsertDupl),
            "30i-70c" => Some(Workload::InsertContains),
            "1d-9i-90c" => Some(Workload::Mixed),
            _ => None,
        }
    }

    fn default_span(self) -> i64 {
        match self {
            Workload::InsertDupl => 500,
            _ => i64::from(u32::MAX),
        }
    }

    fn default_prefill(self) -> i64 {
        match self {
            Workload::Mixed => 1000,
            _ => 0,
        }
    }
}

struct Config {
    threads: usize,
    dur: time::Duration,
    workload: Workload,
    workload_name: String,
    skewed: bool,
    span: i64,
    prefill: i64,
    verify: bool,
    zipf: ZipfDistribution,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = App::new("Concurrent sorted list benchmarker")
        .version(crate_version!())
        .about("Benchmark the lock-coupled list, optionally against a single-RwLock baseline")
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .help("Set the number of worker threads")
                .default_value("4")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("secs")
                .short("s")
                .long("secs")
                .help("Seconds to run each implementation for")
                .default_value("5")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("workload")
                .short("w")
                .long("workload")
                .possible_values(Workload::NAMES)
                .default_value("30i-70c")
                .help("Set the operation mix")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("distribution")
                .short("d")
                .long("dist")
                .possible_values(&["uniform", "skewed"])
                .default_value("uniform")
                .help("Set the key distribution")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("span")
                .long("span")
                .help("Draw keys from 0..SPAN (defaults depend on the workload)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("prefill")
                .long("prefill")
                .help("Insert 0..PREFILL before timing starts")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("compare")
                .short("c")
                .help("Also benchmark the RwLock baseline"),
        )
        .arg(
            Arg::with_name("verify")
                .long("verify")
                .help("Check ordering and the element count after each run"),
        )
        .get_matches();

    let threads = value_t!(matches, "threads", usize).unwrap_or_else(|e| e.exit());
    let secs = value_t!(matches, "secs", u64).unwrap_or_else(|e| e.exit());
    let workload_name = matches.value_of("workload").unwrap_or("30i-70c").to_owned();
    let workload = Workload::from_name(&workload_name).unwrap_or(Workload::InsertContains);
    let span = if matches.is_present("span") {
        value_t!(matches, "span", i64).unwrap_or_else(|e| e.exit())
    } else {
        workload.default_span()
    };
    let prefill = if matches.is_present("prefill") {
        value_t!(matches, "prefill", i64).unwrap_or_else(|e| e.exit())
    } else {
        workload.default_prefill()
    };
    if span <= 0 {
        clap::Error::with_description("--span must be positive", clap::ErrorKind::InvalidValue)
            .exit();
    }
    let zipf = match ZipfDistribution::new(span as usize, 1.03) {
        Ok(z) => z,
        Err(()) => clap::Error::with_description(
            "--span is out of range for the skewed distribution",
            clap::ErrorKind::InvalidValue,
        )
        .exit(),
    };

    let cfg = Config {
        threads,
        dur: time::Duration::from_secs(secs),
        workload,
        workload_name,
        skewed: matches.value_of("distribution") == Some("skewed"),
        span,
        prefill,
        verify: matches.is_present("verify"),
        zipf,
    };
    info!(
        threads = cfg.threads,
        secs,
        workload = %cfg.workload_name,
        span = cfg.span,
        prefill = cfg.prefill,
        skewed = cfg.skewed,
        "starting benchmark"
    );

    if matches.is_present("compare") {
        run("simple", Arc::new(SimpleSet::new()), &cfg);
    }
    run("clist", Arc::new(IntList::new()), &cfg);
}

fn run<S: IntSet + 'static>(name: &str, set: Arc<S>, cfg: &Config) {
    for v in 0..cfg.prefill {
        set.insert(v);
    }
    debug!(implementation = name, len = set.len(), "prefilled");

    let start = time::Instant::now();
    let end = start + cfg.dur;
    let join: Vec<_> = (0..cfg.threads)
        .map(|_| {
            let set = Arc::clone(&set);
            let workload = cfg.workload;
            let skewed = cfg.skewed;
            let span = cfg.span;
            let zipf = cfg.zipf;
            thread::spawn(move || drive(&*set, end, workload, skewed, span, zipf))
        })
        .collect();

    let dur_in_s = cfg.dur.as_secs_f64();
    let dist = if cfg.skewed { "skewed" } else { "uniform" };
    let mut total = 0;
    for (i, jh) in join.into_iter().enumerate() {
        let ops = jh.join().unwrap_or_else(|_| {
            error!(implementation = name, thread = i, "worker panicked");
            process::exit(1);
        });
        total += ops;
        println!(
            "{:2} {:10} {:8} {:8} {:12.0} ops/s thread {}",
            cfg.threads,
            cfg.workload_name,
            dist,
            name,
            ops as f64 / dur_in_s,
            i
        );
    }
    println!(
        "{:2} {:10} {:8} {:8} {:12.0} ops/s total",
        cfg.threads,
        cfg.workload_name,
        dist,
        name,
        total as f64 / dur_in_s
    );

    if cfg.verify {
        match check::quiescent(&*set) {
            Ok(()) => info!(implementation = name, len = set.len(), "invariants hold"),
            Err(e) => {
                error!(implementation = name, error = %e, "invariant violated");
                process::exit(1);
            }
        }
    }
}

fn drive<S: IntSet>(
    set: &S,
    end: time::Instant,
    workload: Workload,
    skewed: bool,
    span: i64,
    zipf: ZipfDistribution,
) -> usize {
    use rand::Rng;

    let mut ops = 0;
    let mut t_rng = rand::thread_rng();
    while time::Instant::now() < end {
        // generate both so that overhead is always the same
        let id_uniform: i64 = t_rng.gen_range(0..span);
        let id_skewed = zipf.sample(&mut t_rng) as i64 - 1;
        let id = if skewed { id_skewed } else { id_uniform };
        match workload {
            Workload::Insert | Workload::InsertDupl => {
                set.insert(id);
            }
            Workload::InsertContains => {
                if t_rng.gen_range(0..10) < 3 {
                    set.insert(id);
                } else {
                    set.contains(id);
                }
            }
            Workload::Mixed => match t_rng.gen_range(0..100) {
                0..=8 => {
                    set.insert(id);
                }
                9 => {
                    set.delete(id);
                }
                _ => {
                    set.contains(id);
                }
            },
        }
        ops += 1;
    }

    ops
}
