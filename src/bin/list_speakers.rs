//! list-speakers: print the voices an AivisSpeech Engine offers.
//!
//! Each style ID can be used as `engine.speaker_id` in config.yaml.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "list-speakers", about = "List AivisSpeech speakers and style IDs")]
struct Args {
    /// AivisSpeech Engine base URL
    #[arg(long, default_value = "http://127.0.0.1:10101")]
    url: String,
}

// --- GET /speakers response ---

#[derive(Deserialize)]
struct Speaker {
    name: String,
    speaker_uuid: Option<String>,
    #[serde(default)]
    styles: Vec<Style>,
}

#[derive(Deserialize)]
struct Style {
    id: i64,
    name: String,
}

async fn fetch_speakers(client: &Client, base_url: &str) -> Result<Vec<Speaker>, reqwest::Error> {
    client
        .get(format!("{}/speakers", base_url.trim_end_matches('/')))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

fn print_speakers(speakers: &[Speaker]) {
    let rule = "=".repeat(70);
    println!("{rule}\nAvailable speakers\n{rule}");

    for speaker in speakers {
        println!("\n[{}]", speaker.name);
        if let Some(uuid) = &speaker.speaker_uuid {
            println!("UUID: {uuid}");
        }
        for style in &speaker.styles {
            println!("  style: {:<20} id: {}", style.name, style.id);
        }
        println!("{}", "-".repeat(50));
    }

    let first = speakers
        .iter()
        .find_map(|s| s.styles.first().map(|style| (s, style)));
    if let Some((speaker, style)) = first {
        println!(
            "\nExample config.yaml ({} / {}):\n\nengine:\n  speaker_id: {}",
            speaker.name, style.name, style.id
        );
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| Client::new());

    match fetch_speakers(&client, &args.url).await {
        Ok(speakers) if speakers.is_empty() => {
            println!("No speakers found. Check the AivisSpeech installation.");
            ExitCode::SUCCESS
        }
        Ok(speakers) => {
            print_speakers(&speakers);
            ExitCode::SUCCESS
        }
        Err(e) if e.is_connect() => {
            eprintln!("Cannot connect to AivisSpeech Engine at {}.", args.url);
            eprintln!("Make sure AivisSpeech is running and listening on that port.");
            ExitCode::FAILURE
        }
        Err(e) if e.is_timeout() => {
            eprintln!("AivisSpeech Engine at {} timed out.", args.url);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Failed to list speakers: {e}");
            ExitCode::FAILURE
        }
    }
}
