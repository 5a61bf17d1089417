#[tokio::main]
async fn main() {
    if let Err(err) = gazetrace_lib::run().await {
        log::error!("gazetrace failed: {err:#}");
        std::process::exit(1);
    }
}
