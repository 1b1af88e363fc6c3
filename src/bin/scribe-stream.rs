use anyhow::{bail, Context, Result};
use crossterm::style::Stylize;
use scribe_stream::api::ScribeClient;
use scribe_stream::config::{parse_n_results, Config};
use scribe_stream::state::{ChatSession, SessionUpdate, StreamOutcome};
use scribe_stream::types::{BaseChat, RetrievedDocument, StreamRequest};
use std::io::{IsTerminal, Write};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: scribe-stream [-n <n-results>] <base-chat-id> <query...>";

#[derive(Debug, PartialEq, Eq)]
struct CliArgs {
    base_chat_id: i64,
    query: String,
    n_results: Option<u32>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs> {
    let mut args = args.into_iter().peekable();
    let mut n_results = None;

    while let Some(flag) = args.peek() {
        match flag.as_str() {
            "-n" | "--n-results" => {
                args.next();
                let raw = args.next().context(USAGE)?;
                n_results = Some(parse_n_results(&raw)?);
            }
            "-h" | "--help" => bail!(USAGE),
            _ => break,
        }
    }

    let raw_id = args.next().context(USAGE)?;
    let base_chat_id = raw_id
        .trim()
        .parse::<i64>()
        .with_context(|| format!("invalid base chat id '{raw_id}'"))?;
    let query = args.collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        bail!("please provide a query string\n{USAGE}");
    }

    Ok(CliArgs {
        base_chat_id,
        query,
        n_results,
    })
}

fn heading(text: &str, styled: bool) -> String {
    if styled {
        text.bold().cyan().to_string()
    } else {
        text.to_string()
    }
}

fn render_base_chat(chat: &BaseChat, styled: bool) -> String {
    let or_null = |value: Option<&str>| value.unwrap_or("null").to_string();
    let mut out = format!("{}\n", heading(&chat.name, styled));
    if !chat.desc.is_empty() {
        out.push_str(&format!("{}\n", chat.desc));
    }
    out.push_str(&format!(
        "vector collection: {}\n",
        or_null(chat.vec_col_name.as_deref())
    ));
    out.push_str(&format!(
        "chat model: {}\n",
        or_null(chat.chat_model.as_ref().map(|model| model.name.as_str()))
    ));
    out.push_str(&format!(
        "system prompt: {}\n",
        or_null(chat.system_prompt.as_ref().map(|prompt| prompt.name.as_str()))
    ));
    out
}

fn render_document(doc: &RetrievedDocument, show_embedding: bool, styled: bool) -> String {
    let distance = doc
        .distance
        .map(|distance| distance.to_string())
        .unwrap_or_else(|| "null".to_string());
    let metadata = serde_json::to_string_pretty(&doc.metadata)
        .unwrap_or_else(|_| "<metadata serialization error>".to_string());

    let mut out = format!("{} {}\n", heading("ID:", styled), doc.id);
    out.push_str(&format!("{} {distance}\n", heading("Distance:", styled)));
    if show_embedding {
        out.push_str(&format!("{} {}\n", heading("Embedding:", styled), doc.embedding));
    }
    out.push_str(&format!("{} {}\n", heading("Document:", styled), doc.document));
    out.push_str(&format!("{}\n{metadata}\n", heading("Metadata:", styled)));
    out
}

#[derive(Debug, Clone, Copy)]
struct RenderOptions {
    show_embeddings: bool,
    styled: bool,
}

/// Writes one session update as it arrives. A documents update reprints the
/// whole retrieved context, since it replaces the previous one.
fn print_update(
    update: SessionUpdate,
    out: &mut impl Write,
    options: RenderOptions,
) -> Result<()> {
    match update {
        SessionUpdate::AnswerDelta(text) => out.write_all(text.as_bytes())?,
        SessionUpdate::Documents(documents) => {
            writeln!(out, "{}", heading("Context documents", options.styled))?;
            for doc in &documents {
                writeln!(
                    out,
                    "{}",
                    render_document(doc, options.show_embeddings, options.styled)
                )?;
            }
            if !documents.is_empty() {
                writeln!(out, "{}", heading("Answer", options.styled))?;
            }
        }
        SessionUpdate::Phase(_) => return Ok(()),
    }
    out.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    config.validate()?;
    let args = parse_args(std::env::args().skip(1))?;

    let styled = std::io::stdout().is_terminal();
    let options = RenderOptions {
        show_embeddings: config.show_embeddings,
        styled,
    };
    let client = ScribeClient::new(&config)?;

    match client.fetch_base_chat(args.base_chat_id).await {
        Ok(chat) => println!("{}", render_base_chat(&chat, styled)),
        Err(error) => eprintln!("[warning] {error:#}"),
    }

    let request = StreamRequest::new(args.query, args.n_results.unwrap_or(config.n_results));
    let mut session = ChatSession::new();
    let cancel = CancellationToken::new();
    let (update_tx, mut update_rx) = mpsc::unbounded_channel::<SessionUpdate>();
    let mut stdout = std::io::stdout();

    let result = {
        let mut turn = std::pin::pin!(session.stream_query_with_cancel(
            &client,
            args.base_chat_id,
            &request,
            cancel.clone(),
            Some(&update_tx),
        ));
        loop {
            tokio::select! {
                result = &mut turn => break result,
                Some(update) = update_rx.recv() => print_update(update, &mut stdout, options)?,
                _ = tokio::signal::ctrl_c() => cancel.cancel(),
            }
        }
    };
    drop(update_tx);
    while let Some(update) = update_rx.recv().await {
        print_update(update, &mut stdout, options)?;
    }
    println!();

    if result? == StreamOutcome::Cancelled {
        eprintln!("[request cancelled]");
    }
    Ok(())
}
