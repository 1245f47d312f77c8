use colored::Colorize;
use sprawl::commands::command_argument_builder;
use sprawl::handlers::{RunOptions, handle_benchmark, init_tracing, print_banner};

#[tokio::main]
async fn main() {
    // clap exits with status 2 on usage errors
    let matches = command_argument_builder().get_matches();
    let options = RunOptions::from_matches(&matches);

    init_tracing(options.verbose, options.quiet);

    if !options.quiet {
        print_banner();
    }

    match handle_benchmark(&options).await {
        Ok(report) => println!("{}", report),
        Err(e) => {
            eprintln!("{} {:#}", "✗".red(), e);
            std::process::exit(1);
        }
    }
}
