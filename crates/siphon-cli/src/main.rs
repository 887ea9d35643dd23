#[tokio::main]
async fn main() {
    let code = siphon_cli::run().await;
    std::process::exit(code);
}
