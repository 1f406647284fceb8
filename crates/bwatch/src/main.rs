use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use bwatch_classeviva::ClassevivaClient;
use bwatch_core::{
    config::Config, extract::PdfExtractor, ledger::SeenLedger, monitor::Monitor,
};
use bwatch_telegram::TelegramNotifier;

#[tokio::main]
async fn main() -> Result<(), bwatch_core::Error> {
    bwatch_core::logging::init("bwatch")?;

    let cfg = Config::load()?;

    let source = Arc::new(ClassevivaClient::new(
        cfg.classeviva_base_url.clone(),
        cfg.classeviva_user.clone(),
        cfg.classeviva_pass.clone(),
    )?);
    let notifier = Arc::new(TelegramNotifier::new(
        &cfg.telegram_bot_token,
        cfg.telegram_chat_id,
    )?);
    let ledger = SeenLedger::load(&cfg.state_file);

    info!(
        state_file = %cfg.state_file.display(),
        interval_secs = cfg.check_interval.as_secs(),
        "starting bulletin monitor"
    );

    let monitor = Monitor::new(
        source,
        notifier,
        Arc::new(PdfExtractor),
        ledger,
        cfg.check_interval,
    );

    // Ctrl-C stops the loop cleanly after the in-flight cycle.
    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    monitor.run(cancel).await;
    Ok(())
}
