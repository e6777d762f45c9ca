//! One-shot Demo
//!
//! Submits a single audit to a fresh local devnet, then reveals it.

use std::path::PathBuf;
use std::sync::Arc;

use gridseal_config::GridsealConfig;
use gridseal_core::{AuditClient, Status, StatusKind, StatusReporter, WalletSession};
use gridseal_record::{Identity, Record, RecordDraft};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::DEFAULT_ACCOUNT;

/// Options for `gridseal demo`
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub name: String,
    /// Raw usage field; separators and units are stripped
    pub usage: String,
    pub score: String,
    pub account: Identity,
    pub config_path: Option<PathBuf>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            name: "Plant A".to_string(),
            usage: "500".to_string(),
            score: "7".to_string(),
            account: Identity(DEFAULT_ACCOUNT.to_string()),
            config_path: None,
        }
    }
}

pub async fn run(config: GridsealConfig, options: DemoOptions) -> anyhow::Result<()> {
    let draft = RecordDraft::parse(&options.name, &options.usage, &options.score)?;

    println!(" Starting local devnet...");
    let session = Arc::new(WalletSession::connected(options.account.clone()));
    let (client, chain) = AuditClient::local(&config, session);
    println!("   Contract: {}", chain.contract());
    println!("   Account:  {}", options.account);
    println!();

    let printer = spawn_status_printer(client.status());

    let id = client.submit(&draft).await?;
    if let Some(record) = client.store().get(&id) {
        print_record(&record);
    }

    let value = client.reveal(&id).await?;
    printer.finish().await;
    println!("🔓 {} used {} kWh", draft.name, value);

    let summary = client.summary();
    println!();
    println!(
        " {} audit(s), {} verified, average score {:.1}",
        summary.total, summary.verified, summary.average_score
    );

    Ok(())
}

/// Prints every visible status as it is published.
pub struct StatusPrinter {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl StatusPrinter {
    /// Print anything already published, then stop.
    pub async fn finish(self) {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            log::warn!("Status printer failed: {}", e);
        }
    }
}

pub fn spawn_status_printer(status: &Arc<StatusReporter>) -> StatusPrinter {
    spawn_printer_with(status, print_status)
}

fn spawn_printer_with<F>(status: &Arc<StatusReporter>, mut emit: F) -> StatusPrinter
where
    F: FnMut(&Status) + Send + 'static,
{
    let mut rx = status.subscribe();
    let (stop, mut stopped) = oneshot::channel();
    let task = tokio::spawn(async move {
        loop {
            // Drain published statuses before honouring the stop.
            tokio::select! {
                biased;
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = rx.borrow_and_update().clone();
                    emit(&status);
                }
                _ = &mut stopped => break,
            }
        }
    });
    StatusPrinter { stop, task }
}

fn print_status(status: &Status) {
    if !status.visible {
        return;
    }
    let icon = match status.kind {
        StatusKind::Pending => "⏳",
        StatusKind::Success => "✅",
        StatusKind::Error => "❌",
    };
    println!("{} {}", icon, status.message);
}

pub fn print_record(record: &Record) {
    let usage = match record.verified_value {
        Some(value) => format!("{} kWh", value),
        None => format!("🔒 {}", record.encrypted_usage_handle),
    };
    println!(
        "   {}  {:<20} score {:>2}  {}",
        record.id, record.name, record.public_score, usage
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridseal_config::StatusConfig;
    use std::sync::Mutex;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_finish_prints_last_status() {
        let status = Arc::new(StatusReporter::new(&StatusConfig::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let printer = spawn_printer_with(&status, move |s: &Status| {
            sink.lock().unwrap().push(s.message.clone());
        });

        status.pending("Verifying decryption on-chain...");
        status.success("Data decrypted and verified successfully!");
        printer.finish().await;

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen.last().map(String::as_str),
            Some("Data decrypted and verified successfully!")
        );
        status.shutdown();
    }
}
