//! Slacker - Export Slack channel history to structured JSON.
//!
//! Fetches a channel's messages, thread replies and referenced users through
//! the Slack Web API and writes a single export document with statistics.
//!
//!   slacker auth xoxp-...                     # Save and verify a token
//!   slacker channels                          # List member channels
//!   slacker messages -c general -l 50 -t      # Latest 50 messages with threads
//!   slacker export -c general                 # Export #general
//!   slacker export --channel-id C01 --from 2024-01-01 --compress gzip

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    filter_channels, format_channel_stats, format_channels_csv, format_channels_json,
    format_channels_table, format_export_summary, format_messages_json, format_messages_text,
    format_progress, validate_options, ChannelFilter, ExportService, ListFormat, MessageFormat,
    MessageQuery, MessageService, RateLimit,
};
use cli::{parse_date_bound, parse_message_bound, Cli, Commands, DateBound, ExportArgs, MessagesArgs};
use domain::{
    AppConfig, AppError, Compression, DateRange, ExportOptions, ExportResult, OutputFormat,
    ProgressSnapshot,
};
use infrastructure::{
    ensure_config_exists, load_config, resolve_token, save_config, SlackApi, SlackClient,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli) -> domain::Result<()> {
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Export(args) => {
            cmd_export(args, verbose).await?;
        }
        Commands::Messages(args) => {
            cmd_messages(args, verbose).await?;
        }
        Commands::Channels {
            include_archived,
            private_only,
            public_only,
            format,
        } => {
            let format: ListFormat = format
                .parse()
                .map_err(|e| AppError::Config { message: e })?;
            let filter = ChannelFilter {
                include_archived,
                private_only,
                public_only,
            };
            run_blocking(move || cmd_channels(filter, format, verbose)).await?;
        }
        Commands::Auth { token } => {
            run_blocking(move || cmd_auth(token)).await?;
        }
    }

    Ok(())
}

/// Run blocking Slack I/O off the async runtime.
async fn run_blocking<T, F>(f: F) -> domain::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> domain::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Task {
            message: e.to_string(),
        })?
}

/// Export a channel command.
async fn cmd_export(args: ExportArgs, verbose: bool) -> domain::Result<()> {
    let config = load_config()?;
    let token = resolve_token(&config)?;
    let base_url = config.slack.base_url.clone();
    let rate_limit = RateLimit::uniform(config.export.rate_limit());
    let timeout_secs = args.timeout.unwrap_or(config.export.timeout_secs);
    let channel_name = args.channel.clone();

    let mut options = build_export_options(&args, &config)?;
    validate_options(&options)?;

    let task = tokio::task::spawn_blocking(move || -> domain::Result<ExportResult> {
        let client = SlackClient::new(token, base_url)?;
        let service = ExportService::new(client, rate_limit);

        if let Some(name) = channel_name {
            let channel = service.find_channel_by_name(&name)?;
            tracing::info!(name = %channel.name, id = %channel.id, "Resolved channel");
            options.channel_id = channel.id;
        }

        let bar = progress_bar();
        let mut on_progress = |snapshot: ProgressSnapshot| {
            bar.set_position(percent(snapshot.progress));
            bar.set_message(format_progress(&snapshot));
        };

        let result = service.export_channel(&options, Some(&mut on_progress));
        match &result {
            Ok(_) => bar.finish_and_clear(),
            Err(_) => bar.abandon(),
        }
        result
    });

    let joined = if timeout_secs > 0 {
        tokio::time::timeout(Duration::from_secs(timeout_secs), task)
            .await
            .map_err(|_| AppError::Timeout { secs: timeout_secs })?
    } else {
        task.await
    };

    let result = joined.map_err(|e| AppError::Task {
        message: e.to_string(),
    })??;

    println!("{}", format_export_summary(&result, verbose));
    Ok(())
}

/// Merge command-line flags over configured defaults.
fn build_export_options(args: &ExportArgs, config: &AppConfig) -> domain::Result<ExportOptions> {
    let invalid_date = |message: String| AppError::Config { message };

    let from = args
        .from
        .as_deref()
        .map(|v| parse_date_bound(v, DateBound::Start))
        .transpose()
        .map_err(invalid_date)?;
    let to = args
        .to
        .as_deref()
        .map(|v| parse_date_bound(v, DateBound::End))
        .transpose()
        .map_err(invalid_date)?;

    let compression: Compression = args
        .compress
        .as_deref()
        .unwrap_or(&config.export.compression)
        .parse()?;

    Ok(ExportOptions {
        channel_id: args.channel_id.clone().unwrap_or_default(),
        include_threads: config.export.include_threads && !args.no_threads,
        include_files: !args.no_files,
        include_reactions: !args.no_reactions,
        date_range: DateRange::new(from, to),
        output_file: args.output.clone(),
        output_dir: config.export.default_output_dir.clone(),
        format: OutputFormat::from_name(args.format.as_deref().unwrap_or(&config.export.format)),
        compression,
        page_size: args.page_size.unwrap_or(config.export.page_size),
    })
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(100);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("█▉▊▋▌▍▎▏  ");
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(progress: f64) -> u64 {
    (progress.clamp(0.0, 1.0) * 100.0).round() as u64
}

/// Show recent messages command.
async fn cmd_messages(args: MessagesArgs, verbose: bool) -> domain::Result<()> {
    let format: MessageFormat = args
        .format
        .parse()
        .map_err(|e| AppError::Config { message: e })?;
    let query = build_message_query(&args)?;
    query.validate()?;

    let config = load_config()?;
    let token = resolve_token(&config)?;
    let base_url = config.slack.base_url.clone();
    let rate_limit = RateLimit::uniform(config.export.rate_limit());
    let plain = args.no_format;

    run_blocking(move || {
        let client = SlackClient::new(token, base_url)?;
        let service = MessageService::new(client, rate_limit);
        let channel = service.find_channel(args.channel.as_deref(), args.channel_id.as_deref())?;

        if args.stats {
            let stats = service.channel_stats(&channel.id)?;
            match format {
                MessageFormat::Text => println!("{}", format_channel_stats(&channel, &stats)),
                MessageFormat::Json => {
                    let json = serde_json::to_string_pretty(&stats).map_err(AppError::json_parse)?;
                    println!("{json}");
                }
            }
            return Ok(());
        }

        let listing = service.channel_messages(channel, &query)?;
        for warning in &listing.warnings {
            eprintln!("{} {warning}", "Warning:".yellow());
        }

        match format {
            MessageFormat::Text => println!("{}", format_messages_text(&listing, verbose, plain)),
            MessageFormat::Json => {
                let json = format_messages_json(&listing).map_err(AppError::json_parse)?;
                println!("{json}");
            }
        }
        Ok(())
    })
    .await
}

fn build_message_query(args: &MessagesArgs) -> domain::Result<MessageQuery> {
    let bound = |value: &Option<String>| {
        value
            .as_deref()
            .map(parse_message_bound)
            .transpose()
            .map_err(|message| AppError::Config { message })
    };

    Ok(MessageQuery {
        limit: args.limit as usize,
        include_threads: args.threads,
        before: bound(&args.before)?,
        after: bound(&args.after)?,
    })
}

/// List member channels command.
fn cmd_channels(filter: ChannelFilter, format: ListFormat, verbose: bool) -> domain::Result<()> {
    let config = load_config()?;
    let client = SlackClient::new(resolve_token(&config)?, config.slack.base_url.clone())?;

    let channels = filter_channels(client.list_channels()?, &filter);

    match format {
        ListFormat::Table => {
            println!("{}", format_channels_table(&channels));
            println!();
            println!("Total: {} channel(s)", channels.len().to_string().cyan());
        }
        ListFormat::Json => {
            let json = format_channels_json(&channels).map_err(AppError::json_parse)?;
            println!("{json}");
        }
        ListFormat::Csv => print!("{}", format_channels_csv(&channels, verbose)),
    }

    Ok(())
}

/// Save and verify a token command.
fn cmd_auth(token: Option<String>) -> domain::Result<()> {
    ensure_config_exists()?;
    let mut config = load_config()?;

    if let Some(token) = token {
        config.slack.token = Some(token.trim().to_string());
        save_config(&config)?;
        println!(
            "{} Token saved to {}",
            "✓".green().bold(),
            AppConfig::config_file_path().display()
        );
    }

    let client = SlackClient::new(resolve_token(&config)?, config.slack.base_url.clone())?;
    let identity = client.test_auth()?;
    let channels = client.list_channels()?;

    println!("{}", "🔐 Authenticated".bold());
    println!("  Team: {} ({})", identity.team.cyan(), identity.team_id);
    println!("  User: {} ({})", identity.user.cyan(), identity.user_id);
    if !identity.url.is_empty() {
        println!("  URL: {}", identity.url);
    }
    println!("  Member of {} channel(s)", channels.len().to_string().green());

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
