//! Terminal front end: a thin collaborator over `LabelingService`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::AppConfig,
    db::Category,
    labeling::{LabelingService, LabelingSession, MenuTier, NextPicture, PickOutcome, RemoteDelete},
};

#[derive(Parser, Debug)]
#[command(name = "roilabel")]
#[command(about = "Label bundled image crops offline and sync them when online", long_about = None)]
pub struct Args {
    /// JSON config file (missing file = defaults)
    #[arg(short, long, default_value = "roilabel.json")]
    pub config: PathBuf,

    /// Labeler id; empty falls back to "user"
    #[arg(short, long, default_value = "")]
    pub user: String,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Interactive labeling loop (default)
    Label,
    /// Print the next picture that would be offered
    Next,
    /// Push pending labels and report the result
    Sync,
    /// Show picture and label totals
    Status,
}

pub async fn execute(args: Args) -> Result<()> {
    let config = AppConfig::load(Some(args.config.as_path()))?;
    let service = Arc::new(LabelingService::from_config(&config)?);

    // Without a seeded store there is nothing to label.
    service
        .bootstrap()
        .await
        .context("startup failed: label store could not be prepared")?;

    let mut session = service.session(&args.user);
    match args.command.unwrap_or(Command::Label) {
        Command::Label => label_loop(&service, &mut session).await,
        Command::Next => {
            match service.get_next_picture(session.user_id()).await? {
                Some(picture) => println!("{}", picture.picture_id),
                None => println!("All done for today!"),
            }
            Ok(())
        }
        Command::Sync => {
            let outcome = service.sync_to_remote(session.user_id()).await?;
            println!("Pushed {} labels", outcome.pushed);
            Ok(())
        }
        Command::Status => {
            let stats = service.stats(session.user_id()).await?;
            println!(
                "{}: {} of {} pictures labeled, {} waiting to sync",
                session.user_id(),
                stats.labeled,
                stats.pictures,
                stats.unsynced
            );
            Ok(())
        }
    }
}

async fn label_loop(service: &Arc<LabelingService>, session: &mut LabelingSession) -> Result<()> {
    let mut events = service.events().subscribe();
    let watcher = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            info!("{event:?}");
        }
    });

    println!("Hey {}", session.user_id());
    let mut next = session.load_next().await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match &next {
            NextPicture::AllDone => {
                println!("All done for today!");
                if !session.can_undo() {
                    break;
                }
            }
            NextPicture::Ready { picture, entry } => {
                let asset = entry
                    .as_ref()
                    .and_then(|e| e.raw.as_deref())
                    .unwrap_or("<no asset>");
                println!("[{}] {} ({asset})", session.session_count(), picture.picture_id);
            }
        }
        print_menu(session.menu());

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "quit" | "q" => break,
            "undo" | "u" => match session.handle_back().await? {
                Some(outcome) => {
                    if let RemoteDelete::Failed { error } = &outcome.remote {
                        println!("(remote copy not removed: {error})");
                    }
                    if let Some(picture) = session.current().cloned() {
                        let entry = service.catalog().get(&picture.picture_id).cloned();
                        next = NextPicture::Ready { picture, entry };
                    }
                }
                None => println!("Nothing to undo"),
            },
            _ => match parse_choice(input, session.menu()) {
                Some(category) => match session.handle_pick(category).await? {
                    PickOutcome::Recorded {
                        next: upcoming,
                        milestone,
                        ..
                    } => {
                        if let Some(count) = milestone {
                            println!("*** {count} labels this session! ***");
                        }
                        next = upcoming;
                    }
                    PickOutcome::MenuChanged { .. } | PickOutcome::NoPicture => {}
                },
                None => println!("Unrecognized choice '{input}'"),
            },
        }
    }

    session.flush_syncs().await;
    watcher.abort();
    Ok(())
}

fn print_menu(menu: MenuTier) {
    let options: Vec<String> = menu
        .categories()
        .iter()
        .enumerate()
        .map(|(i, category)| format!("{}) {category}", i + 1))
        .collect();
    println!("{}   u) undo   q) quit", options.join("   "));
}

/// Menu position (1-4) or a category name, case-insensitive.
fn parse_choice(input: &str, menu: MenuTier) -> Option<Category> {
    let options = menu.categories();
    if let Ok(position) = input.parse::<usize>() {
        return position.checked_sub(1).and_then(|i| options.get(i).copied());
    }
    Category::TERMINAL
        .iter()
        .chain([Category::More, Category::Back].iter())
        .find(|category| category.as_str().eq_ignore_ascii_case(input))
        .copied()
}
