//! `xml-select`: print the values selected by a path.
//!
//! Usage:
//!   xml-select '<path>'
//!
//! The document is read from stdin; one value is printed per line.

use std::io::{self, Read, Write};

use treebind::cli::select_values;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let Some(path) = args.get(1) else {
        eprintln!("First argument must be a path.");
        std::process::exit(1);
    };

    let mut buf = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut buf) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    match select_values(&buf, path) {
        Ok(values) => {
            let mut out = io::stdout().lock();
            for value in values {
                if writeln!(out, "{value}").is_err() {
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
