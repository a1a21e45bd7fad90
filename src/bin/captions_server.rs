use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use log::info;

use captions_agent::{
    AgentConfig, OpenAiStt, OpenAiTranslator, SessionManager, StubRoomConnector,
};

#[derive(Default, Debug, Copy, Clone, clap::ValueEnum)]
enum Level {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => log::LevelFilter::Error,
            Level::Warn => log::LevelFilter::Warn,
            Level::Info => log::LevelFilter::Info,
            Level::Debug => log::LevelFilter::Debug,
            Level::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Parser)]
#[command(name = "captions-server")]
#[command(about = "Captioning agent control server", long_about = None)]
struct Cli {
    #[arg(long, default_value_t = format!("127.0.0.1"))]
    host: String,

    #[arg(long, default_value_t = 8080)]
    port: u16,

    #[arg(short, long, default_value_t = Level::Info)]
    #[clap(value_enum)]
    level: Level,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} [{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                chrono::Local::now().format("%H:%M:%S.%6f"),
                record.args()
            )
        })
        .filter(None, cli.level.into())
        .init();

    let config = AgentConfig::from_env();
    let stt = Arc::new(OpenAiStt::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.stt_model.clone(),
    )?);
    let translator = Arc::new(OpenAiTranslator::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
        config.translate_model.clone(),
    )?);
    // The conferencing backend is supplied by the embedding host. The stub
    // joins nothing and logs outbound traffic, which is enough to exercise
    // the control surface locally.
    let connector = Arc::new(StubRoomConnector);
    let manager = Arc::new(SessionManager::new(config, connector, stt, translator));

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port).parse()?;
    info!("starting captions control server on {}", addr);
    captions_agent::server::serve(addr, manager).await
}
