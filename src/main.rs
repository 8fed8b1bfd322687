use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use regparser::{CompileContext, MatchTree, NodeRef, TypeRegistry, compile};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern to compile
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Input file (stdin when omitted)
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Require the pattern to consume the whole input
    #[arg(short, long, conflicts_with = "find")]
    whole: bool,

    /// Search for the first match anywhere in the input
    #[arg(short, long)]
    find: bool,

    /// Print the compiled value of every typed node
    #[arg(short = 'v', long)]
    values: bool,
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when the input does not match.
fn run(args: Args) -> Result<bool> {
    let grammar = compile(&args.pattern).context("Failed to compile pattern")?;
    let input = read_input(args.file.as_ref())?;

    let result = if args.whole {
        grammar.match_text(&input)
    } else if args.find {
        grammar.find(&input)
    } else {
        grammar.parse(&input)
    };
    let tree = match result {
        Ok(tree) => tree,
        Err(err) => {
            eprintln!("{err}");
            return Ok(false);
        }
    };

    print!("{tree}");
    if args.values {
        print_values(&tree)?;
    }
    Ok(true)
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read stdin")?;
            Ok(input)
        }
    }
}

fn print_values(tree: &MatchTree) -> Result<()> {
    let registry = TypeRegistry::standard();
    let mut typed: Vec<NodeRef<'_>> = Vec::new();
    tree.root().walk(&mut |n| {
        if n.type_name().is_some() {
            typed.push(n);
        }
    });

    let mut ctx = CompileContext::default();
    for node in typed {
        let value = node.value(registry, &mut ctx)?;
        println!(
            "{}..{} {}: {value:?}",
            node.start(),
            node.end(),
            node.type_name().unwrap_or_default()
        );
    }
    for err in ctx.errors() {
        eprintln!("{err}");
    }
    Ok(())
}
