use crate::CLAP_STYLING;
use clap::{ArgAction, ArgGroup, arg, value_parser};
use sprawl_scanner::extract::normalize_url;
use std::path::PathBuf;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("sprawl")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("sprawl")
        .about("Benchmark sequential and concurrent breadth-first web crawling")
        .styles(CLAP_STYLING)
        .arg(
            arg!(--"async" <MS>)
                .required(false)
                .help("Run the concurrent crawler for MS milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            arg!(--"sync" <MS>)
                .required(false)
                .help("Run the sequential crawler for MS milliseconds")
                .value_parser(value_parser!(u64)),
        )
        .group(
            ArgGroup::new("mode")
                .args(["async", "sync"])
                .required(true)
                .multiple(true),
        )
        .arg(arg!(-v --"verbose" "Debug logging and URLs ranked by in-degree").required(false))
        .arg(arg!(-q --"quiet" "Suppress banner and progress output").required(false))
        .arg(
            arg!(--"seed" <URL>)
                .required(false)
                .help("Seed URL to start from; repeat for several (default: from settings)")
                .action(ArgAction::Append)
                .value_parser(parse_seed),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .help("Settings file (default: ~/.config/sprawl/sprawl.toml)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-w --"workers" <N>)
                .required(false)
                .help("Size of the concurrent fetch pool")
                .value_parser(value_parser!(u16).range(1..)),
        )
        .arg(arg!(--"memory" "Keep the graph in memory instead of the SQLite store").required(false))
}

fn parse_seed(raw: &str) -> Result<String, String> {
    normalize_url(raw).ok_or_else(|| format!("'{}' is not a valid absolute URL", raw))
}
