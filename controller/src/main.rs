mod host;
mod irsend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    host::run().await
}
