#![forbid(unsafe_code)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sharekeep_storage::migrate().await?;
    println!("sharekeep migrations applied");
    Ok(())
}
