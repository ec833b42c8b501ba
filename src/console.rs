//! Terminal frontend: an interactive prompt over the same controller the web
//! UI uses. Plain lines are questions; lines starting with `/` are commands.

use colored::*;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::Backend;
use crate::controller::{Controller, Outcome, StatusTarget};
use crate::error::DocchatError;
use crate::state::{Banner, BannerLevel, ChatEntry, EntryKind, UiState};

pub const HELP: &str = "\
Commands:
  <question>            ask about your documents
  /files <path>...      select files for upload
  /clear-files          clear the selection
  /upload               upload the selected files
  /populate [--reset]   index uploaded documents
  /diagnose             check the embedding pipeline
  /sources              show sources of the last answer
  /status               show counters and selection
  /clear                clear the chat
  /help                 this text
  /quit                 exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Ask(String),
    Files(Vec<String>),
    ClearFiles,
    Upload,
    Populate { reset: bool },
    Diagnose,
    Sources,
    Status,
    Clear,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

/// Parse one input line.
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };
    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("");
    let args: Vec<String> = words.map(String::from).collect();
    match name {
        "files" | "f" => Command::Files(args),
        "clear-files" => Command::ClearFiles,
        "upload" | "u" => Command::Upload,
        "populate" | "p" => Command::Populate {
            reset: args.iter().any(|a| a == "--reset" || a == "-r"),
        },
        "diagnose" => Command::Diagnose,
        "sources" => Command::Sources,
        "status" => Command::Status,
        "clear" => Command::Clear,
        "help" | "h" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

/// Run the prompt until `/quit` or end of input.
pub async fn run<B: Backend>(controller: Controller<B>) -> Result<(), DocchatError> {
    controller.load_initial_counts().await;
    print_header(&controller.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bright_cyan());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if !execute(&controller, parse_command(&line)).await {
            break;
        }
    }
    Ok(())
}

/// Execute one command. Returns `false` when the session should end.
pub async fn execute<B: Backend>(controller: &Controller<B>, command: Command) -> bool {
    match command {
        Command::Empty => {}
        Command::Ask(question) => {
            eprintln!("{}", "  ...".dimmed());
            controller.query(&question).await;
            let state = controller.snapshot();
            if let Some(entry) = state.transcript.last() {
                print_entry(entry);
            }
            println!("  {}", state.source_caption.to_string().dimmed());
            print_sources(&state.sources);
        }
        Command::Files(paths) => {
            let n = controller.select_files(&paths);
            if n < paths.len() {
                eprintln!("{}", format!("  skipped {} unreadable path(s)", paths.len() - n).yellow());
            }
            print_selection(&controller.snapshot());
        }
        Command::ClearFiles => {
            controller.clear_selection();
            println!("  selection cleared");
        }
        Command::Upload => {
            if controller.with_state(|s| !s.selection.is_empty()) {
                eprintln!("{}", "  Uploading...".dimmed());
            }
            controller.upload().await;
            let state = controller.snapshot();
            if let Some(b) = &state.upload_status {
                print_banner(b);
            }
            controller.dismiss(StatusTarget::Upload);
            print_counters(&state);
        }
        Command::Populate { reset } => {
            eprintln!("{}", "  Processing...".dimmed());
            if controller.populate(reset).await == Outcome::Ignored {
                println!("  populate already running");
            }
            let state = controller.snapshot();
            if let Some(b) = &state.db_status {
                print_banner(b);
            }
            controller.dismiss(StatusTarget::Database);
            print_counters(&state);
        }
        Command::Diagnose => {
            controller.diagnose().await;
            if let Some(b) = &controller.snapshot().db_status {
                print_banner(b);
            }
            controller.dismiss(StatusTarget::Database);
        }
        Command::Sources => {
            let state = controller.snapshot();
            println!("  {}", state.source_caption);
            print_sources(&state.sources);
        }
        Command::Status => {
            let state = controller.snapshot();
            print_counters(&state);
            print_selection(&state);
        }
        Command::Clear => {
            controller.clear_chat();
            println!("  {}", "No messages yet".dimmed());
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return false,
        Command::Unknown(name) => {
            eprintln!("{}", format!("  unknown command /{name}; try /help").yellow());
        }
    }
    true
}

fn print_header(state: &UiState) {
    println!("{}", "Document Chat".bright_blue().bold());
    print_counters(state);
    println!("{}", "  Type a question, or /help for commands.".dimmed());
}

fn print_counters(state: &UiState) {
    println!(
        "  Documents: {}  Chunks: {}",
        state.document_count.to_string().bold(),
        state.chunk_count.to_string().bold()
    );
}

fn print_selection(state: &UiState) {
    if state.selection.is_empty() {
        println!("  {}", "no files selected".dimmed());
        return;
    }
    for f in &state.selection {
        println!("  {} {}", f.name, f.size_label().dimmed());
    }
}

fn print_banner(b: &Banner) {
    let text = match b.level {
        BannerLevel::Success => b.text.green(),
        BannerLevel::Warning => b.text.yellow(),
        BannerLevel::Danger => b.text.red(),
        BannerLevel::Progress => b.text.dimmed(),
    };
    println!("  {text}");
    for d in &b.details {
        println!("    {}", d.dimmed());
    }
}

fn print_entry(e: &ChatEntry) {
    let time = e.time_label().dimmed();
    match e.kind {
        EntryKind::User => println!("{} {} {time}", "You:".bold(), e.text),
        EntryKind::Assistant => println!("{} {} {time}", "Assistant:".bright_green().bold(), e.text),
        EntryKind::Error => println!("{} {time}", e.text.red()),
        EntryKind::Typing => println!("{}", "...".dimmed()),
    }
}

fn print_sources(sources: &[String]) {
    for s in sources {
        println!("    - {s}");
    }
}
