//! Interactive front end: one command per line on stdin.

use std::path::PathBuf;

use anyhow::Result;
use client_core::{
    view::{top_k_in_range, SessionView, TOP_K_RANGE},
    ErrorKind, SelectedFile, SessionController, SessionError,
};
use shared::domain::TopK;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{config::Settings, render};

const HELP: &str = "\
commands:
  file <path>       select a document (.pdf or .txt)
  unselect          forget the selected document
  upload            upload the selected document
  topk <1-12>       set the number of retrieved passages
  analyze           run certificate analysis
  ask <question>    ask a question about the document
  fields <a,b,c>    set the fields to fill
  fill              fill the configured fields
  export [dir]      save the last raw response as rag_response.json
  status            show session status
  help              show this help
  quit              leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    File(PathBuf),
    Unselect,
    Upload,
    TopK(i64),
    Analyze,
    Ask(String),
    Fields(String),
    Fill,
    Export(Option<PathBuf>),
    Status,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_ascii_lowercase().as_str() {
            "file" if !rest.is_empty() => ReplCommand::File(PathBuf::from(rest)),
            "file" => return Err("usage: file <path>".into()),
            "unselect" => ReplCommand::Unselect,
            "upload" => ReplCommand::Upload,
            "topk" => rest
                .parse::<i64>()
                .map(ReplCommand::TopK)
                .map_err(|_| "usage: topk <number>".to_string())?,
            "analyze" => ReplCommand::Analyze,
            "ask" => ReplCommand::Ask(rest.to_string()),
            "fields" => ReplCommand::Fields(rest.to_string()),
            "fill" => ReplCommand::Fill,
            "export" if rest.is_empty() => ReplCommand::Export(None),
            "export" => ReplCommand::Export(Some(PathBuf::from(rest))),
            "status" => ReplCommand::Status,
            "help" | "?" => ReplCommand::Help,
            "quit" | "exit" => ReplCommand::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }
}

pub async fn run(controller: &SessionController, settings: &Settings) -> Result<()> {
    println!("{HELP}");
    println!("{}", render::status_line(&view_of(controller)));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match ReplCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        if command == ReplCommand::Quit {
            break;
        }
        execute(controller, settings, command).await;
    }
    Ok(())
}

async fn execute(controller: &SessionController, settings: &Settings, command: ReplCommand) {
    match command {
        ReplCommand::File(path) => match SelectedFile::from_path(&path).await {
            Ok(file) => {
                println!("selected {} ({} bytes)", file.name, file.bytes.len());
                controller.select_file(file);
            }
            Err(e) => println!("cannot read '{}': {e}", path.display()),
        },
        ReplCommand::Unselect => {
            controller.clear_file();
            println!("no file selected");
        }
        ReplCommand::Upload => report(controller, controller.upload().await.map(|_| ())),
        ReplCommand::TopK(value) => {
            if top_k_in_range(TopK(value)) {
                controller.set_result_count(TopK(value));
                println!("top k set to {value}");
            } else {
                println!(
                    "top k must be between {} and {}",
                    TOP_K_RANGE.start(),
                    TOP_K_RANGE.end()
                );
            }
        }
        ReplCommand::Analyze => report(
            controller,
            controller.analyze_certificate().await.map(|_| ()),
        ),
        ReplCommand::Ask(question) => {
            report(controller, controller.ask(&question).await.map(|_| ()))
        }
        ReplCommand::Fields(spec) => {
            controller.set_form_fields_spec(spec);
            println!("fields set");
        }
        ReplCommand::Fill => report(controller, controller.fill_form().await.map(|_| ())),
        ReplCommand::Export(dir) => {
            let dir = dir.unwrap_or_else(|| settings.export_dir.clone());
            match export_to(controller, &dir).await {
                Ok(Some(path)) => println!("saved {}", path.display()),
                Ok(None) => println!("nothing to export yet"),
                Err(e) => println!("Error: {e:#}"),
            }
        }
        ReplCommand::Status => print_view(&view_of(controller)),
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => {}
    }
}

pub async fn export_to(
    controller: &SessionController,
    dir: &std::path::Path,
) -> Result<Option<PathBuf>> {
    match controller.export_raw()? {
        Some(export) => Ok(Some(export.write_to(dir).await?)),
        None => Ok(None),
    }
}

/// Prints the outcome of one operation the way a form would show it: a
/// blocking prompt for validation problems, otherwise the refreshed view.
pub fn report(controller: &SessionController, outcome: Result<(), SessionError>) {
    if let Err(err) = &outcome {
        if err.kind() == ErrorKind::Validation {
            println!("! {err}");
            return;
        }
        if err.needs_upload() {
            println!("hint: upload a document before running queries");
        } else if err.is_rate_limited() {
            println!("hint: the service is rate limiting requests, wait and retry");
        }
    }
    print_view(&view_of(controller));
}

pub fn print_view(view: &SessionView) {
    println!("{}", render::status_line(view));
    if let Some(rows) = &view.certificate {
        print!("{}", render::certificate(rows));
    }
    if let Some(answer) = &view.answer {
        print!("{}", render::answer(answer));
    }
    if let Some(rows) = &view.form {
        print!("{}", render::filled_form(rows));
    }
    if let Some(notice) = render::notice(view) {
        println!("{notice}");
    }
    if let Some(error) = render::error(view) {
        println!("{error}");
    }
    if view.can_export {
        println!("(raw response available: export)");
    }
}

fn view_of(controller: &SessionController) -> SessionView {
    SessionView::from_state(&controller.snapshot())
}
