use slot_allocator::config::ServerSettings;
use slot_allocator::server;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    server::run_server(ServerSettings::from_env()).await
}
