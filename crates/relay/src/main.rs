use relay_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), relay_core::Error> {
    relay_core::logging::init("relay")?;

    let cfg = Config::load()?;
    tracing::info!(
        admin = cfg.admin_chat_id.0,
        webhook = %cfg.webhook_url(),
        "starting relay bot"
    );

    relay_telegram::router::run_webhook(cfg)
        .await
        .map_err(|e| relay_core::Error::External(format!("relay bot failed: {e}")))?;

    Ok(())
}
