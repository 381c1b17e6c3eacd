use std::fs;
use std::io;
use std::path;
use std::process;
use std::time::Duration;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;

use net_sort::{write_partition, ClusterTopology, NodeBuilder, RecordBufferBuilder, RecordReader};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let rank: usize = arg_parser.value_of_t_or_exit("rank");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");
    let mem_limit: Option<&str> = arg_parser.value_of("mem_limit");
    let threads: Option<usize> = arg_parser
        .is_present("threads")
        .then(|| arg_parser.value_of_t_or_exit("threads"));
    let retry_delay_ms: u64 = arg_parser.value_of_t_or_exit("retry_delay_ms");
    let max_connect_attempts: Option<usize> = arg_parser
        .is_present("max_connect_attempts")
        .then(|| arg_parser.value_of_t_or_exit("max_connect_attempts"));
    let rw_buf_size: Option<&str> = arg_parser.value_of("rw_buf_size");

    let config = arg_parser.value_of("config").expect("value is required");
    let topology = match ClusterTopology::load(path::Path::new(config)) {
        Ok(topology) => topology,
        Err(err) => {
            log::error!("cluster topology loading error: {}", err);
            process::exit(1);
        }
    };
    log::info!("rank {} of {} servers: {:?}", rank, topology.size(), topology.peers());

    let input = arg_parser.value_of("input").expect("value is required");
    let input_stream = match fs::File::open(input) {
        Ok(file) => RecordReader::new(io::BufReader::new(file)),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let mut node_builder = NodeBuilder::new(rank, topology).with_retry_delay(Duration::from_millis(retry_delay_ms));
    if let Some(threads) = threads {
        node_builder = node_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = tmp_dir {
        node_builder = node_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(attempts) = max_connect_attempts {
        node_builder = node_builder.with_max_connect_attempts(attempts);
    }

    if let Some(rw_buf_size) = rw_buf_size {
        node_builder = node_builder.with_rw_buf_size(
            rw_buf_size.parse::<ByteSize>().expect("value is pre-validated").as_u64() as usize,
        );
    }

    if let Some(mem_limit) = mem_limit {
        node_builder = node_builder.with_buffer(RecordBufferBuilder::with_mem_limit(
            mem_limit.parse::<ByteSize>().expect("value is pre-validated").as_u64(),
        ));
    }

    let node = match node_builder.build() {
        Ok(node) => node,
        Err(err) => {
            log::error!("node initialization error: {}", err);
            process::exit(1);
        }
    };

    let sorted_stream = match node.run(input_stream) {
        Ok(sorted_stream) => sorted_stream,
        Err(err) => {
            log::error!("partition exchange error: {}", err);
            process::exit(1);
        }
    };

    let output = arg_parser.value_of("output").expect("value is required");
    let mut output_stream = match fs::File::create(output) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    };

    match write_partition(sorted_stream, &mut output_stream) {
        Ok(written) => log::info!("sorted {} to {} ({} records)", input, output, written),
        Err(err) => {
            log::error!("data saving error: {}", err);
            process::exit(1);
        }
    }

    if let Err(err) = output_stream.get_ref().sync_all() {
        log::error!("output file closing error: {}", err);
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("net-sort")
        .about("distributed external sorter")
        .arg(
            clap::Arg::new("rank")
                .help("rank of this node in the cluster topology")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("input")
                .help("input shard to be sorted")
                .required(true)
                .index(2),
        )
        .arg(
            clap::Arg::new("output")
                .help("sorted output shard")
                .required(true)
                .index(3),
        )
        .arg(
            clap::Arg::new("config")
                .help("cluster topology file")
                .required(true)
                .index(4),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .arg(
            clap::Arg::new("threads")
                .short('t')
                .long("threads")
                .help("number of threads to use for parallel sorting")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store spilled runs")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("mem_limit")
                .short('m')
                .long("mem-limit")
                .help("memory used to buffer received records before spilling to disk")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Memory limit format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("retry_delay_ms")
                .long("retry-delay-ms")
                .help("pause between failed connection attempts, in milliseconds")
                .takes_value(true)
                .default_value("0"),
        )
        .arg(
            clap::Arg::new("max_connect_attempts")
                .long("max-connect-attempts")
                .help("connection attempts per peer before giving up, unbounded if not set")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("rw_buf_size")
                .long("rw-buf-size")
                .help("spilled runs read/write buffer size")
                .takes_value(true)
                .validator(|v| match v.parse::<ByteSize>() {
                    Ok(_) => Ok(()),
                    Err(err) => Err(format!("Buffer size format incorrect: {}", err)),
                }),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
