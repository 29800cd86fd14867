#[tokio::main]
async fn main() -> anyhow::Result<()> {
    voicebridge::run().await
}
