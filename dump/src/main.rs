//! A CLI tool for inspecting the contents of a tagged element stream
//! by printing the decoded attribute tree in a human readable format.
use clap::Parser;
use dcmio_core::{
    AttributeList, DecodeOptions, Endianness, Tag, TransferSyntax, Value, VrEncoding,
    DEFAULT_MAX_DEPTH,
};
use snafu::{Report, ResultExt, Whatever};
use std::path::PathBuf;

/// Exit code for when an error emerged while reading a file.
const ERROR_READ: i32 = -2;

/// Dump the contents of element stream files
#[derive(Debug, Parser)]
#[command(version)]
struct App {
    /// The file(s) to read
    #[clap(required = true)]
    files: Vec<PathBuf>,
    /// Decode with implicit VR; without a dictionary, non-sequence
    /// elements print as raw unknown bytes
    #[clap(long)]
    implicit: bool,
    /// Decode fixed-width fields as big endian
    #[clap(long = "big-endian")]
    big_endian: bool,
    /// Stop before the given tag, e.g. `7FE0,0010`
    #[clap(long)]
    stop: Option<Tag>,
    /// Maximum sequence nesting depth accepted from the input
    #[clap(long = "max-depth", default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: u32,
    /// Leave binary payloads of at least this many bytes on disk
    #[clap(long = "deferred-threshold")]
    deferred_threshold: Option<u32>,
    /// Fail if any errors are encountered
    #[clap(long = "fail-first")]
    fail_first: bool,
}

fn main() {
    run().unwrap_or_else(|e| {
        eprintln!("{}", Report::from_error(e));
        std::process::exit(ERROR_READ);
    });
}

fn run() -> Result<(), Whatever> {
    let app = App::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::WARN)
            .finish(),
    )
    .whatever_context("Could not set up global logging subscriber")?;

    let syntax = TransferSyntax::new(
        if app.implicit {
            VrEncoding::Implicit
        } else {
            VrEncoding::Explicit
        },
        if app.big_endian {
            Endianness::Big
        } else {
            Endianness::Little
        },
    );
    let options = DecodeOptions {
        stop_at: app.stop,
        max_depth: app.max_depth,
        deferred_threshold: app.deferred_threshold,
        cancel: None,
    };

    let fail_first = app.files.len() == 1 || app.fail_first;
    let mut errors: i32 = 0;

    for filename in &app.files {
        println!("{}: ", filename.display());
        match AttributeList::read_file(filename, syntax, &options) {
            Ok(list) => dump_list(&list, 0),
            Err(e) => {
                eprintln!("{}", Report::from_error(e));
                if fail_first {
                    std::process::exit(ERROR_READ);
                }
                errors += 1;
            }
        }
    }

    if errors > 0 {
        std::process::exit(ERROR_READ);
    }
    Ok(())
}

fn dump_list(list: &AttributeList, level: usize) {
    let indent = "  ".repeat(level);
    for attribute in list {
        println!("{}{}", indent, attribute);
        if let Value::Sequence(items) = attribute.value() {
            for (i, item) in items.iter().enumerate() {
                println!("{}  item {}:", indent, i);
                dump_list(item.list(), level + 2);
            }
        }
    }
}
