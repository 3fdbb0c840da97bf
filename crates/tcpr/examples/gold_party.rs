//! Gold party: every ten seconds, drop a pile of coins on a random
//! player.
//!
//! Run against a local KAG server with TCPR enabled:
//!
//! ```sh
//! cargo run --example gold_party
//! ```

use std::time::Duration;

use tcpr::Client;
use tracing::info;

const DROP_COINS: &str = "server_DropCoins(Vec2f(0, -50) + getPlayer(XORRandom(getPlayerCount())).getBlob().getPosition(), 10)";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let client = Client::connect("127.0.0.1:50301", "admin", Duration::from_secs(2)).await?;
    info!("Connected to rcon server");
    client.message("Gold Party Enabled!").await?;

    loop {
        tokio::time::sleep(Duration::from_secs(10)).await;
        client.write(DROP_COINS).await?;
    }
}
