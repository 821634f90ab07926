//! hadith-translator: 可恢复的圣训批量翻译工具

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use hadith_translator::env::{self, core::LogLevel, EnvVar};
use hadith_translator::translation::{
    open_store, require_language, ConfigManager, JobController, JobState, ProgressSnapshot,
    StopSignal, TranslationResult, TranslatorConfig, LANGUAGES,
};

#[derive(Parser)]
#[command(name = "hadith-translator")]
#[command(version)]
#[command(about = "Resumable batch translation of the hadith corpus")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(short, long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate the corpus into one language, resuming from its checkpoint
    Run {
        /// Target language id or ISO code
        #[arg(value_name = "LANGUAGE")]
        language: String,
    },

    /// Delete the checkpoint and translations of one language
    Reset {
        #[arg(value_name = "LANGUAGE")]
        language: String,
    },

    /// Export the translations of one language as JSON
    Export {
        #[arg(value_name = "LANGUAGE")]
        language: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List supported languages and translated counts
    Languages,

    /// Print the supported environment variables
    Env,

    /// Write an example configuration file
    InitConfig {
        #[arg(value_name = "FILE", default_value = "hadith-translator.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match execute(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    process::exit(code);
}

async fn execute(cli: Cli) -> TranslationResult<i32> {
    match cli.command {
        Commands::Env => {
            print!("{}", env::generate_env_docs());
            Ok(0)
        }
        Commands::InitConfig { path } => {
            ConfigManager::generate_example_config(&path)?;
            println!("已生成示例配置: {}", path.display());
            Ok(0)
        }
        Commands::Run { language } => {
            let config = load_config(cli.config, cli.data_dir)?;
            run_language(&config, &language).await
        }
        Commands::Reset { language } => {
            let config = load_config(cli.config, cli.data_dir)?;
            let lang = require_language(&language)?;
            open_store(&config)?.reset(lang.id)?;
            println!("已重置 {}", lang.id);
            Ok(0)
        }
        Commands::Export { language, output } => {
            let config = load_config(cli.config, cli.data_dir)?;
            let lang = require_language(&language)?;
            let mapping = open_store(&config)?.export(lang.id)?;
            if mapping.is_empty() {
                eprintln!("{} 没有任何译文", lang.id);
                return Ok(1);
            }

            let body = serde_json::to_string_pretty(&mapping)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, body)?;
                    println!("已导出 {} 本书到 {}", mapping.len(), path.display());
                }
                None => println!("{}", body),
            }
            Ok(0)
        }
        Commands::Languages => {
            let config = load_config(cli.config, cli.data_dir)?;
            let store = open_store(&config)?;
            println!("{:<12} {:<6} {:<20} {:>10}", "ID", "CODE", "NAME", "TRANSLATED");
            for lang in LANGUAGES {
                println!(
                    "{:<12} {:<6} {:<20} {:>10}",
                    lang.id,
                    lang.code,
                    lang.native_name,
                    store.translated_count(lang.id)?
                );
            }
            Ok(0)
        }
    }
}

fn load_config(path: Option<PathBuf>, data_dir: Option<PathBuf>) -> TranslationResult<TranslatorConfig> {
    let manager = match path {
        Some(path) => ConfigManager::from_file(&path)?,
        None => ConfigManager::new()?,
    };

    let mut config = manager.into_config();
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir;
    }
    Ok(config)
}

async fn run_language(config: &TranslatorConfig, language: &str) -> TranslationResult<i32> {
    let lang = require_language(language)?;
    let controller = JobController::from_config(config)?;

    let stop = StopSignal::new();
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("收到中断信号，当前章节保存后停止...");
            ctrl_c_stop.request_stop();
        }
    });

    let (tx, mut rx) = watch::channel(ProgressSnapshot::idle(lang.id));
    let reporter = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            if snapshot.state == JobState::Checkpointing {
                tracing::info!(
                    "{} {}: 已翻译 {} 条, 剩余 {} 条",
                    snapshot.current_group.as_deref().unwrap_or("-"),
                    snapshot.current_section.as_deref().unwrap_or("-"),
                    snapshot.total_translated,
                    snapshot.remaining
                );
            }
        }
    });

    let outcome = controller.run(lang.id, &stop, &tx).await;
    drop(tx);
    let _ = reporter.await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    Ok(match outcome.state {
        JobState::Errored => 1,
        _ => 0,
    })
}

fn init_tracing() {
    let level = LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
