use std::sync::Arc;

use marketplace_transport::{Config, IdentityState, RequestOptions, TransportClient};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional: enable basic logging for the demo
    let _ = tracing_subscriber::fmt().try_init();

    // MARKETPLACE_API_URL must point at the resource server
    let config = Config::from_env()?;
    let identity = Arc::new(IdentityState::new());
    let client = TransportClient::builder(config)
        .session_sink(identity.clone())
        .build()?;

    client.refresh_credential().await?;
    println!("signed in as {:?}", identity.current().and_then(|c| c.email));

    let listings: serde_json::Value = client.get_json("/resources").await?;
    println!("{listings:#}");

    client
        .get("/user/profile", RequestOptions::default())
        .await?;
    client.logout().await;
    Ok(())
}
