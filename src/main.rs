#[tokio::main]
async fn main() -> std::io::Result<()> {
    doodle_duel::run_with_config().await
}
