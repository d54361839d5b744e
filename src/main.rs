use std::process::ExitCode;
use log::error;
use nouvo_gateway::{startup, Config};

#[tokio::main]
async fn main() -> ExitCode
{   env_logger::Builder::from_env(
      env_logger::Env::default().default_filter_or("info")
    ).init();

    // configuration problems are fatal before any port is bound
    let config = match Config::from_env()
    {   Ok(config) => config
      , Err(e) => {
          error!("Invalid configuration: {}", e);
          return ExitCode::FAILURE;
        }
    };

    match startup(config).await
    {   Ok(()) => ExitCode::SUCCESS
      , Err(e) => {
          error!("Server failed: {}", e);
          ExitCode::FAILURE
        }
    }
}
