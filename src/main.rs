#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dashboard_server::run().await
}
