use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use podcast_transcriptor::cli::{ChunkingOverrides, Cli, Commands, OutputFormat};
use podcast_transcriptor::config::Config;
use podcast_transcriptor::output::{self, ConsoleProgress, FormatOptions};
use podcast_transcriptor::transcribe::{RunOptions, TranscriptionPipeline};
use podcast_transcriptor::utils;
use podcast_transcriptor::TranscriptorError;

fn init_tracing(cli: &Cli) {
    let default_level = if cli.verbose {
        "podcast_transcriptor=debug,podscribe=debug"
    } else if cli.quiet {
        "podcast_transcriptor=warn,podscribe=warn"
    } else {
        "podcast_transcriptor=info,podscribe=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    let registry = tracing_subscriber::registry().with(filter);

    // stdout is reserved for the transcript
    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = Config::load().await?;

    match cli.command {
        Commands::Transcribe {
            source,
            output,
            format,
            timestamps,
            detailed_timestamps,
            speakers,
            live,
            chunk_duration,
            overlap,
            handover,
            duration,
            model,
            api_key,
            save_audio,
        } => {
            if duration.is_none() {
                let missing_deps = utils::check_dependencies().await;
                if !missing_deps.is_empty() {
                    eprintln!("⚠️  Dependency check warnings:");
                    for dep in missing_deps {
                        eprintln!("   • {}", dep);
                    }
                }
            }

            ChunkingOverrides {
                chunk_duration,
                overlap,
                handover,
            }
            .apply(&mut config)?;

            if let Some(model) = model {
                config.engine.model = model;
            }

            let format = format
                .or_else(|| OutputFormat::from_name(&config.app.default_output_format))
                .unwrap_or(OutputFormat::Text);

            let pipeline = TranscriptionPipeline::new(
                config,
                RunOptions {
                    api_key,
                    duration,
                    save_audio,
                },
            )?;

            tracing::info!("Starting transcription for: {}", source);

            let progress = ConsoleProgress::new(cli.quiet, live);
            let result = match pipeline.transcribe_from_source(&source, &progress).await {
                Ok(result) => result,
                Err(e) => {
                    progress.finish(&[]);
                    if let Some(err) = e.downcast_ref::<TranscriptorError>() {
                        if let (true, Ok(path)) = (err.is_asset_failure(), Config::config_path()) {
                            eprintln!("Check the source and the app limits in {}", path.display());
                        }
                    }
                    return Err(e);
                }
            };
            progress.finish(&result.lines);

            if !result.metadata.failed_chunks.is_empty() {
                tracing::warn!(
                    "{} of {} chunks failed and left gaps: {:?}",
                    result.metadata.failed_chunks.len(),
                    result.metadata.chunk_count,
                    result.metadata.failed_chunks
                );
            }

            let options = FormatOptions {
                timestamps: timestamps || detailed_timestamps,
                detailed_timestamps,
                speakers,
            };

            match output {
                Some(path) => {
                    output::save_to_file(&result, &path, &format, options).await?;
                    println!("Transcription saved to: {}", path.display());
                }
                None => {
                    output::print_to_console(&result, &format, options)?;
                }
            }

            if let Some(audio_duration) = result.metadata.audio_duration {
                tracing::info!(
                    "Transcribed {} of audio into {} lines",
                    utils::format_duration(audio_duration),
                    result.lines.len()
                );
            }

            if let Some(audio_path) = result.audio_path {
                println!("Audio saved to: {}", audio_path.display());
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                config.save().await?;
                println!("Configuration written to: {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}
