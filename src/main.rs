use clap::Parser;
use paste_rtc::{logger, Cli};

#[tokio::main]
async fn main() {
    let config = Cli::parse().into_config();
    if let Err(err) = logger::init(config.log_level) {
        eprintln!("{err}");
    }

    if let Err(err) = paste_rtc::run(config).await {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
