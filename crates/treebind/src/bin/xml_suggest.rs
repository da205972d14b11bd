//! `xml-suggest`: match a query against the options of a document.
//!
//! Usage:
//!   xml-suggest '<options-path>' '<query>' [--contains] [--cells '<path>']
//!
//! The document is read from stdin. Each match is printed as the option
//! value, a tab, and the caption with matched parts in brackets.

use std::io::{self, Read, Write};

use treebind::cli::suggest;
use treebind::suggest::WildcardMode;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 2 {
        eprintln!("Usage: xml-suggest '<options-path>' '<query>' [--contains] [--cells '<path>']");
        std::process::exit(1);
    }

    let mut mode = WildcardMode::StartsWith;
    let mut cells = None;
    let mut rest = args[2..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--contains" => mode = WildcardMode::Contains,
            "--cells" => cells = rest.next().map(String::as_str),
            other => {
                eprintln!("Unknown argument '{other}'.");
                std::process::exit(1);
            }
        }
    }

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match suggest(&buf, &args[0], cells, &args[1], mode) {
        Ok(lines) => {
            let mut out = io::stdout().lock();
            for line in lines {
                if writeln!(out, "{line}").is_err() {
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
