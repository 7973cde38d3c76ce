//! Ori build driver CLI.

use oric::commands::{build_project, explain_error, parse_build_args, ENGINE_ENV};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let command = &args[1];

    match command.as_str() {
        "build" => {
            let options = parse_build_args(&args[2..]);
            oric::init_tracing(options.verbose);
            std::process::exit(build_project(&options));
        }
        "help" | "--help" | "-h" => {
            print_usage();
        }
        "version" | "--version" | "-V" => {
            println!("Ori build driver {}", env!("CARGO_PKG_VERSION"));
        }
        "--explain" | "explain" => {
            if args.len() < 3 {
                eprintln!("Usage: ori explain <ERROR_CODE>");
                eprintln!("Example: ori explain E7001");
                std::process::exit(1);
            }
            explain_error(&args[2]);
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Ori build driver (incremental compilation)");
    println!();
    println!("Usage: ori <command> [options]");
    println!();
    println!("Commands:");
    println!("  build [path]         Build the source tree (default: current directory)");
    println!("  explain <code>       Explain a build error code (e.g., E7001)");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Build options:");
    println!("  --engine=<command>   Compile engine command, run once per unit");
    println!("                       Placeholders: {{file}}, {{type}}, {{out}}");
    println!("                       Falls back to ${ENGINE_ENV}");
    println!("  --out=<dir>          Output directory");
    println!("  --static             Clean and copy the output directory on full rebuilds");
    println!("  --ext=<list>         Typed source extensions (default: ori)");
    println!("  --rebuild            Rebuild everything");
    println!("  --watch[=<ms>]       Rebuild when sources change (default: 500ms)");
    println!("  --json               Print the report as JSON on stdout");
    println!("  -v, --verbose        Log build phases to stderr");
    println!();
    println!("Examples:");
    println!("  ori build src --engine=\"oric-engine --out={{out}} {{file}}\" --out=build");
    println!("  ori build src --rebuild --static --out=build");
    println!("  ori build --watch");
    println!("  ori explain E7003");
}
