use anyhow::{anyhow, Result};
use gosub_shared::byte_stream::{ByteStream, Encoding, Location};
use gosub_xml::errors::{Error, ParseError};
use gosub_xml::parser::task::ParseTask;
use gosub_xml::parser::XmlParserOptions;
use gosub_xml::tokenizer::{TokenSource, Tokenizer};
use gosub_xml::writer::DocumentWriter;
use simple_logger::SimpleLogger;
use std::fs;

fn main() -> Result<()> {
    let matches = clap::Command::new("Gosub XML parser")
        .version("0.1.0")
        .arg(
            clap::Arg::new("file")
                .help("The file to parse")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("debug")
                .help("Enable debug logging")
                .short('d')
                .long("debug")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("tokens")
                .help("Just print the tokens")
                .long("tokens")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("worker")
                .help("Parse on a worker thread")
                .long("worker")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            clap::Arg::new("quiet")
                .help("Don't display the document")
                .long("quiet")
                .short('q')
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let debug = matches.get_flag("debug");
    let quiet = matches.get_flag("quiet");
    let tokens = matches.get_flag("tokens");
    let worker = matches.get_flag("worker");
    let file = matches
        .get_one::<String>("file")
        .ok_or_else(|| anyhow!("no file given"))?;

    if debug {
        SimpleLogger::new().init()?;
    }

    let bytes = fs::read(file)?;

    if tokens {
        print_tokens(&bytes)?;
        return Ok(());
    }

    let task = ParseTask::from_bytes(&bytes, None)?;
    task.subscribe(Box::new(|err: &ParseError| {
        let severity = if err.fatal { "fatal" } else { "error" };
        println!("{severity}: {} at {}:{}", err.message, err.line(), err.column());
    }));

    let result = if worker { task.spawn()?.join() } else { task.run() };

    let document = match result {
        Ok(document) => document,
        Err(Error::Fatal { kind, location }) => {
            display_snippet(&String::from_utf8_lossy(&bytes), location);
            return Err(anyhow!("{kind} at line {}, column {}", location.line, location.column));
        }
        Err(e) => return Err(e.into()),
    };

    if !quiet {
        println!("{}", DocumentWriter::write_document(&document));
    }

    Ok(())
}

fn display_snippet(source: &str, location: Location) {
    let lines: Vec<&str> = source.lines().collect();
    let line_nr = location.line.saturating_sub(1);
    let col_nr = location.column.saturating_sub(1);

    println!();
    for n in line_nr.saturating_sub(5)..line_nr {
        println!("{:<5}|{}", n + 1, lines.get(n).unwrap_or(&""));
    }

    println!("{:<5}|{}", line_nr + 1, lines.get(line_nr).unwrap_or(&""));
    println!("   ---{}^", "-".repeat(col_nr));

    for n in line_nr + 1..(line_nr + 6).min(lines.len()) {
        println!("{:<5}|{}", n + 1, lines[n]);
    }
    println!();
}

fn print_tokens(bytes: &[u8]) -> Result<()> {
    let options = XmlParserOptions::default();

    let mut stream = ByteStream::new(Encoding::UTF8, None);
    stream.read_from_bytes(bytes)?;
    options.prepare_stream(&mut stream);

    let error_logger = options.error_logger();
    let mut tokenizer = Tokenizer::new(stream, Location::default(), error_logger.clone());
    loop {
        let token = tokenizer.next_token()?;
        println!("{:?}", token);

        if token.is_eof() {
            break;
        }
    }

    for err in error_logger.lock().get_errors() {
        println!("error: {} at {}:{}", err.message, err.line(), err.column());
    }

    Ok(())
}
