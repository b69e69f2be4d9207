use postboard_client::{
    api::{DEFAULT_POSTS_URL, HttpPostsClient},
    form::{SubmitEvent, TEXT_FIELD, TITLE_FIELD},
    sync::{SyncError, ViewSynchronizer},
};
use postboard_common::model::post::PostId;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
commands:
  title <value>   fill in the title field
  text <value>    fill in the text field
  submit          submit the form
  delete <id>     delete a post
  reload          list all posts again
  show            print the board
  quit            exit";

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("POSTS_URL is not a valid url: {0}")]
    PostsUrl(String),
    #[error("Error reading commands: {0}")]
    Stdin(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    #[serde(default = "default_posts_url")]
    posts_url: String,
}

fn default_posts_url() -> String {
    DEFAULT_POSTS_URL.to_owned()
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
enum Command {
    Field(&'static str, String),
    Submit,
    Delete(PostId),
    Reload,
    Show,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));

    let command = match word {
        "title" => Command::Field(TITLE_FIELD, rest.to_owned()),
        "text" => Command::Field(TEXT_FIELD, rest.to_owned()),
        "submit" => Command::Submit,
        "delete" => Command::Delete(
            rest.trim()
                .parse()
                .map_err(|_| format!("Not a post id: {rest:?}"))?,
        ),
        "reload" => Command::Reload,
        "show" => Command::Show,
        "help" | "" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(format!("Unknown command {word:?}, try \"help\"")),
    };

    Ok(command)
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "postboard=info,postboard_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    let env: Env = envy::from_env()?;
    reqwest::Url::parse(&env.posts_url).map_err(|err| InitError::PostsUrl(err.to_string()))?;

    Ok(env)
}

/// Runs an operation on its own task so that it neither blocks input nor waits
/// for other operations.
fn spawn_operation<F>(operation: F)
where
    F: Future<Output = Result<String, SyncError>> + Send + 'static,
{
    tokio::spawn(async move {
        match operation.await {
            Ok(done) => info!("{done}"),
            // Rejections by the server are already reported by the synchronizer.
            Err(SyncError::Client(_)) => {}
            Err(err) => info!("{err}"),
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let sync = Arc::new(ViewSynchronizer::new(HttpPostsClient::new(env.posts_url)));
    info!(posts_url = sync.api().posts_url(), "Loading posts");

    spawn_operation({
        let sync = Arc::clone(&sync);
        async move {
            let count = sync.load().await?;
            Ok(format!("Loaded {count} posts"))
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.map_err(InitError::Stdin)? {
        let command = match parse_command(&line) {
            Ok(command) => command,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        match command {
            Command::Field(name, value) => {
                if let Err(err) = sync.set_field(name, value) {
                    println!("{err}");
                }
            }
            Command::Submit => spawn_operation({
                let sync = Arc::clone(&sync);
                async move {
                    let handle = sync.submit(&mut SubmitEvent::new()).await?;
                    Ok(format!("Added post as {handle}"))
                }
            }),
            Command::Delete(id) => spawn_operation({
                let sync = Arc::clone(&sync);
                async move {
                    sync.remove_on_confirmed_delete(id).await?;
                    Ok(format!("Deleted post {id}"))
                }
            }),
            Command::Reload => spawn_operation({
                let sync = Arc::clone(&sync);
                async move {
                    let count = sync.load().await?;
                    Ok(format!("Loaded {count} posts"))
                }
            }),
            Command::Show => println!("{}", sync.markup()),
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    Ok(())
}
