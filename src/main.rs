use rag_chat::api;
use rag_chat::config::{enable_tracing, print_configuration, AppConfig, Secrets};
use rag_chat::ingest::{load_books_and_split, load_pdf_and_split, TextSplitter};
use rag_chat::providers::{available_models, ChatMessage};
use rag_chat::rag::{format_references, strip_references, RagChain};

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use colored::Colorize;
use dotenv::dotenv;
use futures::StreamExt;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tokio::net::TcpListener;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Run the HTTP API server instead of the interactive chat
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "3000")]
    port: u16,

    /// Index every PDF in the configured books_dir, then exit
    #[arg(long)]
    ingest: bool,

    /// Override the configured books_dir for --ingest
    #[arg(long)]
    books_dir: Option<String>,

    /// Override the configured chat model
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    colored::control::set_override(true);

    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    let secrets = Secrets::from_env();

    if config.ui.verbose {
        print_configuration(&config);
    }
    enable_tracing(&config, &secrets);

    if args.ingest {
        let books_dir = args
            .books_dir
            .clone()
            .unwrap_or_else(|| config.text_splitting.books_dir.clone());
        run_ingest(&config, &secrets, &books_dir, args.model.as_deref()).await
    } else if args.serve {
        run_api_server(config, secrets, args).await
    } else {
        run_cli(config, secrets, args.model.as_deref()).await
    }
}

async fn run_ingest(
    config: &AppConfig,
    secrets: &Secrets,
    books_dir: &str,
    model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let chain = RagChain::build(config, secrets, model).await?;

    let splitter = TextSplitter::new(
        config.text_splitting.chunk_size,
        config.text_splitting.chunk_overlap,
    );
    let chunks = load_books_and_split(books_dir, &splitter)?;

    println!("Indexing {} chunks...", chunks.len());
    let start = Instant::now();
    chain.index_chunks(&chunks).await?;
    println!(
        "{}",
        format!("Done in {:.1} s.", start.elapsed().as_secs_f64()).green()
    );

    Ok(())
}

async fn run_api_server(
    config: AppConfig,
    secrets: Secrets,
    args: Args,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;

    let chain = RagChain::build(&config, &secrets, args.model.as_deref()).await?;
    let app = api::create_api(chain, config, secrets);

    println!("Starting API server on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_help() {
    println!("{}", "Commands:".bold());
    println!("  load <file.pdf>   index a PDF into the vector store");
    println!("  models            list the available chat models");
    println!("  model <id>        switch the chat model");
    println!("  clear             forget the conversation so far");
    println!("  help              show this menu");
    println!("  exit | quit       leave");
    println!("Anything else is sent to the assistant as a question.");
}

async fn run_cli(
    config: AppConfig,
    secrets: Secrets,
    model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut chain = RagChain::build(&config, &secrets, model).await?;
    let mut history: Vec<ChatMessage> = Vec::new();
    let mut question_count: usize = 0;

    println!("{}", config.ui.title.bold());
    println!("{}", config.ui.hello_msg);
    println!(
        "{}",
        format!("Chatting with {} (type 'help' for commands)", chain.model_id()).cyan()
    );

    let mut rl = Editor::<(), DefaultHistory>::new()?;

    loop {
        match rl.readline("👤 ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                rl.add_history_entry(input)?;

                match input {
                    "exit" | "quit" => break,
                    "help" => print_help(),
                    "clear" => {
                        history.clear();
                        println!("{}", "Conversation cleared.".yellow());
                    }
                    "models" => {
                        for model in available_models() {
                            if model == chain.model_id() {
                                println!("  {} {}", "*".green(), model);
                            } else {
                                println!("    {}", model);
                            }
                        }
                    }
                    _ if input.starts_with("model ") => {
                        let model_id = input["model ".len()..].trim();
                        match RagChain::build(&config, &secrets, Some(model_id)).await {
                            Ok(new_chain) => {
                                chain = new_chain;
                                history.clear();
                                println!("{}", format!("Now using {}.", model_id).green());
                            }
                            Err(e) => println!("{}", format!("Model switch failed: {}", e).red()),
                        }
                    }
                    _ if input.starts_with("load ") => {
                        let path = input["load ".len()..].trim();
                        if let Err(e) = load_one_pdf(&chain, &config, path).await {
                            println!("{}", format!("Load failed: {}", e).red());
                        }
                    }
                    question => {
                        question_count += 1;
                        if let Err(e) =
                            answer_question(&chain, &config, question, &mut history).await
                        {
                            println!("{}", format!("Error: {}", e).red());
                        }
                        log::info!("Questions asked so far: {}", question_count);
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}

async fn load_one_pdf(chain: &RagChain, config: &AppConfig, path: &str) -> anyhow::Result<()> {
    let splitter = TextSplitter::new(
        config.text_splitting.chunk_size,
        config.text_splitting.chunk_overlap,
    );
    let chunks = load_pdf_and_split(Path::new(path), &splitter)?;
    chain.index_chunks(&chunks).await?;
    println!(
        "{}",
        format!("Indexed {} chunks from {}.", chunks.len(), path).green()
    );
    Ok(())
}

async fn answer_question(
    chain: &RagChain,
    config: &AppConfig,
    question: &str,
    history: &mut Vec<ChatMessage>,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let answer_text = if config.ui.do_streaming {
        let (mut stream, context) = chain.ask_stream(question, history).await?;

        print!("🤖 ");
        let mut full = String::new();
        while let Some(token) = stream.next().await {
            let token = token?;
            print!("{}", token);
            std::io::stdout().flush()?;
            full.push_str(&token);
        }
        println!();

        if config.ui.add_references {
            println!("{}", format_references(&context).cyan());
        }
        full
    } else {
        let answer = chain.ask(question, history).await?;

        let text = answer.highlighted().unwrap_or_else(|e| {
            log::warn!("dropping citations: {}", e);
            answer.answer.clone()
        });
        println!("🤖 {}", text);

        if config.ui.add_references {
            println!("{}", format_references(&answer.context).cyan());
        }
        answer.answer
    };

    log::info!("Answered in {:.1} s.", start.elapsed().as_secs_f64());

    // references must not leak into the model's view of its own turns
    history.push(ChatMessage::user(question));
    history.push(ChatMessage::assistant(strip_references(&answer_text)));

    Ok(())
}
