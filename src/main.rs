use wr3223_bridge::options::Options;
use wr3223_bridge::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let options = Options::new();

    if let Err(e) = wr3223_bridge::run(options).await {
        error!("{:?}", e);
        std::process::exit(255);
    }

    Ok(())
}
