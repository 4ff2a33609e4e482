use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jieri_interaction::assistant::Assistant;
use jieri_interaction::attachment;
use jieri_interaction::calendar::{CalendarEventsTool, CalendarificClient};
use jieri_interaction::openai::OpenAiClient;
use jieri_interaction::tool::ToolRegistry;

#[derive(Parser)]
#[command(name = "jieri")]
#[command(about = "jieri - Taiwanese calendar holiday Q&A assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a holiday question from model knowledge only
    Ask {
        /// The question, e.g. "2024年台灣10月紀念日有哪些?"
        question: String,
        /// Attach a local image to the question
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Answer a holiday question with the live calendar lookup tool available
    Lookup {
        /// The question, e.g. "2024年台灣10月紀念日有哪些?"
        question: String,
    },
    /// Two-turn conversation: list a month's holidays, then judge a
    /// follow-up membership question against the stored list
    FollowUp {
        /// First question, producing the holiday list
        question1: String,
        /// Follow-up question referencing the stored list
        question2: String,
        /// Session identifier grouping the two turns (random if omitted)
        #[arg(long)]
        session: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // diagnostics to stderr so stdout stays strict JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let llm = Arc::new(OpenAiClient::try_from_env()?);

    let response = match cli.command {
        Commands::Ask { question, image } => {
            let assistant = Assistant::new(llm);
            match image {
                Some(path) => {
                    let data_url = attachment::image_to_data_url(&path)?;
                    assistant.answer_with_image(&question, &data_url).await?
                }
                None => assistant.answer(&question).await?,
            }
        }
        Commands::Lookup { question } => {
            let assistant = Assistant::new(llm).with_tools(lookup_registry()?);
            assistant.answer(&question).await?
        }
        Commands::FollowUp {
            question1,
            question2,
            session,
        } => {
            let session_id =
                session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            tracing::info!(session = %session_id, "starting two-turn conversation");

            let assistant = Assistant::new(llm).with_tools(lookup_registry()?);
            assistant.follow_up(&session_id, &question1, &question2).await?
        }
    };

    println!("{}", response.to_json()?);
    Ok(())
}

fn lookup_registry() -> Result<ToolRegistry> {
    let client = CalendarificClient::try_from_env()?;
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(CalendarEventsTool::new(client)));
    Ok(registry)
}
