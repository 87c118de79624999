use clap::Parser;
use fire_projection::api::{Cli, CliError, Command, projection_json, run_http_server};

#[tokio::main]
async fn main() {
    fire_projection::init_tracing();

    let result = match Cli::parse().command {
        Command::Project(args) => projection_json(args).map(|json| println!("{json}")),
        Command::Serve { port } => run_http_server(port).await.map_err(CliError::from),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
