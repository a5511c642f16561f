use anyhow::Context as _;

use crate::cli::{ReaderArgs, ReaderCommand};
use crate::progress::ProgressStore;

pub async fn run(command: ReaderCommand) -> anyhow::Result<()> {
    match command {
        ReaderCommand::Enable(args) => set(args, true).await,
        ReaderCommand::Disable(args) => set(args, false).await,
        ReaderCommand::Status(args) => {
            let store = ProgressStore::new(&args.progress);
            let key = host_key(&args.host);
            let enabled = store
                .reader_enabled(&key)
                .await
                .context("read reader setting")?;
            println!("{key}: {}", if enabled { "enabled" } else { "disabled" });
            Ok(())
        }
    }
}

async fn set(args: ReaderArgs, enabled: bool) -> anyhow::Result<()> {
    let store = ProgressStore::new(&args.progress);
    let key = host_key(&args.host);
    store
        .set_reader_enabled(&key, enabled)
        .await
        .with_context(|| format!("save reader setting: {}", store.path().display()))?;
    tracing::info!(host = %key, enabled, "reader setting saved");
    Ok(())
}

/// Settings key for a host: lowercased, without a leading `www.`.
pub fn host_key(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_owned(),
        None => host,
    }
}
