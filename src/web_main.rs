//! 控制接口服务器主程序入口

use hadith_translator::env::{core::LogLevel, EnvVar};
use hadith_translator::translation::{ConfigManager, JobRegistry};
use hadith_translator::web::{WebConfig, WebServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    // 解析命令行参数
    let args: Vec<String> = std::env::args().collect();

    let mut web_config = WebConfig::from_env()?;

    // 简单的命令行参数解析
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" | "-b" => {
                if i + 1 < args.len() {
                    web_config.bind_addr = args[i + 1].clone();
                    i += 2;
                } else {
                    eprintln!("Error: --bind requires an address");
                    std::process::exit(1);
                }
            }
            "--port" | "-p" => {
                if i + 1 < args.len() {
                    web_config.port = args[i + 1].parse().unwrap_or_else(|_| {
                        eprintln!("Error: Invalid port number");
                        std::process::exit(1);
                    });
                    i += 2;
                } else {
                    eprintln!("Error: --port requires a port number");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("Error: Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    let config = ConfigManager::new()?.into_config();
    let registry = JobRegistry::from_config(&config)?;

    // 启动 Web 服务器
    let server = WebServer::new(web_config, registry);
    server.start().await?;

    Ok(())
}

fn init_tracing() {
    let level = LogLevel::get().unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_help() {
    println!("Hadith Translator Control Server");
    println!();
    println!("USAGE:");
    println!("    hadith-translator-web [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -b, --bind <ADDRESS>     Bind address [default: $HOST or 127.0.0.1]");
    println!("    -p, --port <PORT>        Port number [default: $PORT or 5000]");
    println!("    -h, --help               Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    OPENAI_API_KEY is required; see `hadith-translator env` for all variables");
    println!();
    println!("EXAMPLES:");
    println!("    hadith-translator-web");
    println!("    hadith-translator-web --bind 0.0.0.0 --port 3000");
}
