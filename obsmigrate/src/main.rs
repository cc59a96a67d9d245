#[tokio::main]
async fn main() -> anyhow::Result<()> {
    obsmigrate::run_cli().await
}
