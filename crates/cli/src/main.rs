//! LLM metrics CLI entry point.

#[tokio::main]
async fn main() {
    if let Err(e) = llm_metrics_cli::run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
