//! Headless commands: the same components the terminal UI drives, one
//! operation per invocation.

use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::cache::{FetchOutcome, Request};
use crate::outbox::{SyncOutcome, SyncReport};
use crate::remote::StoryLookup;
use crate::services::Services;
use crate::store::{Photo, StoryDraft, StoryRecord};

#[derive(Subcommand, Debug)]
pub enum CliCommand {
  /// Queue a new story and try to deliver the outbox
  Post {
    /// Story text
    #[arg(short, long)]
    description: String,
    /// Image to attach
    #[arg(short, long)]
    photo: Option<PathBuf>,
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Only queue; deliver on the next sync
    #[arg(long)]
    queue_only: bool,
  },
  /// Deliver every pending story
  Sync,
  /// List stories waiting for delivery
  Outbox,
  /// Drop a queued story without delivering it
  Discard { id: String },
  /// Verify saved stories against the server and list the survivors
  Bookmarks,
  /// Save or remove a story
  #[command(subcommand)]
  Bookmark(BookmarkCommand),
  /// Manage the offline response cache
  #[command(subcommand)]
  Cache(CacheCommand),
  /// Register a push subscription
  Subscribe {
    #[arg(long)]
    endpoint: String,
    #[arg(long)]
    p256dh: String,
    #[arg(long)]
    auth: String,
  },
  /// Remove a push subscription
  Unsubscribe {
    #[arg(long)]
    endpoint: String,
  },
}

#[derive(Subcommand, Debug)]
pub enum BookmarkCommand {
  /// Fetch a story from the server and save it locally
  Add { id: String },
  Remove { id: String },
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
  /// Precache the static manifest into the configured generation
  Install,
  /// Make the configured generation current and delete all others
  Activate,
  /// Route a request through the cache
  Get {
    url: String,
    /// Treat the request as a page navigation (offline page fallback)
    #[arg(long)]
    navigate: bool,
    /// Write the response body to stdout
    #[arg(long)]
    body: bool,
  },
  /// Entry counts of the current generation
  Stats,
}

pub async fn run(command: CliCommand, services: Services) -> Result<()> {
  match command {
    CliCommand::Post {
      description,
      photo,
      lat,
      lon,
      queue_only,
    } => {
      let photo = photo.as_deref().map(read_photo).transpose()?;
      let record = services.outbox.enqueue(StoryDraft {
        description,
        photo,
        lat,
        lon,
      })?;
      println!("queued {}", record.id);
      if !queue_only {
        print_report(&services.outbox.sync_all().await?);
      }
    }
    CliCommand::Sync => print_report(&services.outbox.sync_all().await?),
    CliCommand::Outbox => {
      let pending = services.outbox.pending()?;
      if pending.is_empty() {
        println!("outbox is empty");
      }
      for record in &pending {
        print_record(record);
      }
    }
    CliCommand::Discard { id } => {
      services.outbox.discard(&id)?;
      println!("discarded {}", id);
    }
    CliCommand::Bookmarks => {
      let mut bookmarks = services.bookmarks.lock().await;
      let report = bookmarks.load_bookmarks().await?;
      for id in &report.evicted {
        println!("removed {} (deleted on the server)", id);
      }
      for (id, e) in &report.failures {
        println!("kept {} (could not verify: {})", id, e);
      }
      for entry in bookmarks.bookmarks() {
        print_record(entry);
      }
    }
    CliCommand::Bookmark(BookmarkCommand::Add { id }) => {
      let story = match services.client.get_story(&id).await? {
        StoryLookup::Found(story) => story,
        StoryLookup::NotFound => return Err(eyre!("Story {} does not exist", id)),
      };
      services.bookmarks.lock().await.add_bookmark(story)?;
      println!("bookmarked {}", id);
    }
    CliCommand::Bookmark(BookmarkCommand::Remove { id }) => {
      services.bookmarks.lock().await.remove_bookmark(&id)?;
      println!("removed bookmark {}", id);
    }
    CliCommand::Cache(command) => run_cache(command, &services).await?,
    CliCommand::Subscribe {
      endpoint,
      p256dh,
      auth,
    } => {
      services.client.subscribe(&endpoint, &p256dh, &auth).await?;
      println!("subscribed");
    }
    CliCommand::Unsubscribe { endpoint } => {
      services.client.unsubscribe(&endpoint).await?;
      println!("unsubscribed");
    }
  }
  Ok(())
}

async fn run_cache(command: CacheCommand, services: &Services) -> Result<()> {
  let cache = &services.cache;
  match command {
    CacheCommand::Install => {
      let count = cache.install().await?;
      println!("installed {} entries into {}", count, cache.generation());
    }
    CacheCommand::Activate => {
      let retired = cache.activate()?;
      println!("{} is current", cache.generation());
      for name in retired {
        println!("deleted {}", name);
      }
    }
    CacheCommand::Get {
      url,
      navigate,
      body,
    } => {
      let request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      };
      let outcome = cache.handle(&request).await?;
      let source = match &outcome {
        FetchOutcome::Cached(_) => "cache",
        FetchOutcome::Network(_) => "network",
        FetchOutcome::OfflineFallback(_) => "offline page",
        FetchOutcome::Miss(e) => return Err(eyre!("Not cached and unreachable: {}", e)),
      };
      if let Some(response) = outcome.response() {
        eprintln!(
          "{} from {} ({} bytes)",
          response.status,
          source,
          response.body.len()
        );
        if body {
          std::io::stdout()
            .write_all(&response.body)
            .map_err(|e| eyre!("Failed to write body: {}", e))?;
        }
      }
    }
    CacheCommand::Stats => {
      let stats = cache.stats()?;
      println!(
        "{}: {} static, {} dynamic",
        cache.generation(),
        stats.static_entries,
        stats.dynamic_entries
      );
    }
  }
  Ok(())
}

fn read_photo(path: &Path) -> Result<Photo> {
  let bytes =
    std::fs::read(path).map_err(|e| eyre!("Failed to read photo {}: {}", path.display(), e))?;
  let file_name = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .ok_or_else(|| eyre!("Photo path has no file name: {}", path.display()))?;
  Ok(Photo::new(file_name, bytes))
}

fn print_record(record: &StoryRecord) {
  println!(
    "{}  {}  {}",
    record.id,
    record.created_at.format("%Y-%m-%d %H:%M"),
    record.description.lines().next().unwrap_or_default()
  );
}

fn print_report(report: &SyncReport) {
  for (id, outcome) in &report.outcomes {
    match outcome {
      SyncOutcome::Delivered { remote_id: Some(remote) } => {
        println!("delivered {} as {}", id, remote)
      }
      SyncOutcome::Delivered { remote_id: None } => println!("delivered {}", id),
      SyncOutcome::Failed(e) => println!("kept {}: {}", id, e),
      SyncOutcome::Skipped => println!("skipped {} (already being delivered)", id),
    }
  }
  println!(
    "{} delivered, {} still queued",
    report.delivered(),
    report.failed()
  );
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::Parser;

  #[derive(Parser, Debug)]
  struct TestCli {
    #[command(subcommand)]
    command: CliCommand,
  }

  fn parse(args: &[&str]) -> CliCommand {
    TestCli::try_parse_from(std::iter::once("storysync").chain(args.iter().copied()))
      .unwrap()
      .command
  }

  #[test]
  fn test_post_with_location() {
    match parse(&["post", "-d", "hello", "--lat", "-6.2", "--lon", "106.8"]) {
      CliCommand::Post { description, lat, lon, .. } => {
        assert_eq!(description, "hello");
        assert_eq!(lat, Some(-6.2));
        assert_eq!(lon, Some(106.8));
      }
      other => panic!("unexpected {:?}", other),
    }
  }

  #[test]
  fn test_post_requires_both_coordinates() {
    let result = TestCli::try_parse_from(["storysync", "post", "-d", "x", "--lat", "1.0"]);
    assert!(result.is_err());
  }

  #[test]
  fn test_nested_subcommands() {
    assert!(matches!(
      parse(&["bookmark", "add", "story-1"]),
      CliCommand::Bookmark(BookmarkCommand::Add { id }) if id == "story-1"
    ));
    assert!(matches!(
      parse(&["cache", "get", "http://localhost/", "--navigate"]),
      CliCommand::Cache(CacheCommand::Get { navigate: true, body: false, .. })
    ));
  }

  #[test]
  fn test_read_photo_guesses_mime() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("beach.PNG");
    std::fs::write(&path, [1u8, 2, 3]).unwrap();

    let photo = read_photo(&path).unwrap();
    assert_eq!(photo.file_name, "beach.PNG");
    assert_eq!(photo.mime, "image/png");
    assert_eq!(photo.bytes, vec![1, 2, 3]);
  }
}
