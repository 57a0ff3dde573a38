use clap::Parser;
use sensexbot::adapter::inbound::cli::{self, command::Cli, output};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    cli::configure(&cli);

    if let Err(e) = cli::execute(&cli).await {
        if output::is_json() {
            output::json_output(serde_json::json!({
                "type": "error",
                "payload": { "message": e.to_string() },
            }));
        } else {
            eprintln!("{:?}", anyhow::Error::new(e));
        }
        std::process::exit(1);
    }
}
