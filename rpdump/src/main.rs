use clap::Parser as ClapParser;
use std::{
    fs,
    io::{self, Read},
    process,
};

use log::debug;
use rpcode::Script;

#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Builder scripts to disassemble in order
    #[arg(required = false, help = "The builder scripts to disassemble (stdin if none)")]
    files: Vec<String>,

    /// Number of value slots; inferred from the script when omitted
    #[arg(long, help = "Declared value slot count")]
    values: Option<usize>,

    /// Number of uniform slots; inferred from the script when omitted
    #[arg(long, help = "Declared uniform slot count")]
    uniforms: Option<usize>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if cli.files.is_empty() {
        let mut source = String::new();
        if let Err(err) = io::stdin().read_to_string(&mut source) {
            eprintln!("Error reading stdin: {}", err);
            process::exit(1);
        }
        dump_source(&cli, "<stdin>", &source);
        return;
    }

    let headers = cli.files.len() > 1;
    for filename in &cli.files {
        let source = match fs::read_to_string(filename) {
            Ok(content) => content,
            Err(err) => {
                eprintln!("Error reading file '{}': {}", filename, err);
                process::exit(1);
            }
        };
        if headers {
            println!("== {} ==", filename);
        }
        dump_source(&cli, filename, &source);
    }
}

fn dump_source(cli: &Cli, name: &str, source: &str) {
    let script = match Script::parse(source) {
        Ok(script) => script,
        Err(err) => {
            eprintln!("Error parsing {}: {}", name, err);
            process::exit(1);
        }
    };
    debug!(
        "{}: script references {} value slots and {} uniform slots",
        name,
        script.num_value_slots(),
        script.num_uniform_slots()
    );

    match script.finish(cli.values, cli.uniforms) {
        Ok(program) => print!("{}", program),
        Err(err) => {
            eprintln!("Error building {}: {}", name, err);
            process::exit(1);
        }
    }
}
