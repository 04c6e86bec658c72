use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use readmark::clipboard::{Clipboard, SystemClipboard};
use readmark::location::LocationToken;
use readmark::notes;
use readmark::panic_handler;
use readmark::position_store::{JsonPositionStore, PositionStore, position_key};
use readmark::settings::{self, LayoutMode};
use readmark::theme::FontScale;

#[derive(Parser)]
#[command(name = "readmark", version, about = "Reading positions and jump links for e-books")]
struct Cli {
    /// Positions file (defaults to the user data directory)
    #[arg(long, global = true)]
    positions: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, default_value = "readmark.log")]
    log_file: PathBuf,

    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the saved position of a book
    Position { title: String },

    /// Save a position for a book
    SetPosition { title: String, location: String },

    /// Show the most recently read book
    Recent,

    /// Build a reference for a passage
    Reference {
        #[arg(long)]
        file: String,
        #[arg(long)]
        cfi: String,
        #[arg(long)]
        text: String,
        /// Also put it on the system clipboard
        #[arg(long)]
        copy: bool,
    },

    /// Build a link to a page
    PageLink {
        #[arg(long)]
        file: String,
        #[arg(long)]
        cfi: String,
        #[arg(long)]
        copy: bool,
    },

    /// Decode a jump link
    ParseLink { uri: String },

    /// Print the path and initial content of a book's note
    Note { book: String },

    /// Show or change the reader font size (percent)
    FontScale { percent: Option<u16> },

    /// Show or change the page layout (paginated or scrolled)
    Layout { mode: Option<LayoutMode> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    WriteLogger::init(
        cli.log_level,
        Config::default(),
        File::create(&cli.log_file)
            .with_context(|| format!("creating log file {}", cli.log_file.display()))?,
    )?;
    panic_handler::initialize_panic_handler();

    info!("Starting readmark");

    match &cli.config {
        Some(path) => settings::load_settings_from_path(path),
        None => settings::load_settings(),
    }

    let result = run(&cli);
    if let Err(e) = &result {
        error!("Command failed: {e:#}");
    }
    info!("Shutting down readmark");
    result
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Position { title } => {
            let store = open_store(cli);
            match store.load(&position_key(title))? {
                Some(location) => println!("{location}"),
                None => println!("{}", LocationToken::start()),
            }
        }
        Command::SetPosition { title, location } => {
            let mut store = open_store(cli);
            let location = LocationToken::from_external(location);
            store.store(&position_key(title), &location)?;
            info!("Saved {title:?} at {location}");
        }
        Command::Recent => {
            let store = open_store(cli);
            match store.most_recent() {
                Some((title, record)) => {
                    println!(
                        "{title}\t{}\t{}",
                        record.location,
                        record.last_read.format("%Y-%m-%d %H:%M")
                    );
                    info!("{} books tracked", store.len());
                }
                None => println!("No books read yet"),
            }
        }
        Command::Reference {
            file,
            cfi,
            text,
            copy,
        } => {
            let text = text.trim();
            if text.is_empty() {
                bail!("nothing to quote");
            }
            let reference = settings::link_format().reference(
                file,
                &LocationToken::from_external(cfi),
                text,
            );
            emit(&reference, *copy)?;
        }
        Command::PageLink { file, cfi, copy } => {
            let link = settings::link_format().page_link(file, &LocationToken::from_external(cfi));
            emit(&link, *copy)?;
        }
        Command::ParseLink { uri } => {
            let link = settings::link_format().parse(uri)?;
            println!("file\t{}", link.file);
            println!("location\t{}", link.location);
            if let Some(text) = &link.text {
                println!("text\t{text}");
            }
        }
        Command::Note { book } => {
            let options = settings::note_options();
            println!("{}", notes::note_path(book, &options));
            println!();
            print!("{}", notes::note_content(book, &options, chrono::Local::now()));
        }
        Command::FontScale { percent } => {
            if let Some(percent) = percent {
                settings::set_font_scale(FontScale::new(*percent));
            }
            println!("{}", settings::get_font_scale().as_css());
        }
        Command::Layout { mode } => {
            if let Some(mode) = mode {
                settings::set_layout(*mode);
            }
            println!("{}", settings::get_layout().as_str());
        }
    }
    Ok(())
}

fn parse_level(value: &str) -> std::result::Result<LevelFilter, String> {
    value
        .parse()
        .map_err(|_| format!("unknown log level {value:?}"))
}

fn open_store(cli: &Cli) -> JsonPositionStore {
    let path = cli.positions.clone().or_else(JsonPositionStore::default_path);
    JsonPositionStore::load_or_ephemeral(path.as_deref())
}

fn emit(text: &str, copy: bool) -> Result<()> {
    println!("{text}");
    if copy {
        SystemClipboard.write_text(text)?;
        eprintln!("Copied to clipboard");
    }
    Ok(())
}
