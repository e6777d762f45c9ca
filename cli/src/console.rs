//! Interactive Console
//!
//! A line-oriented session against a local devnet. One command per line.

use std::sync::Arc;

use gridseal_config::GridsealConfig;
use gridseal_core::{AuditClient, IdentityProvider, LocalChain, WalletSession};
use gridseal_record::{Identity, RecordDraft, RecordId};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::demo::{print_record, spawn_status_printer};

const HISTORY_SHOWN: usize = 5;

const SAMPLE_AUDITS: [(&str, u64, u8, bool); 3] = [
    ("Riverside Plant", 1840, 6, true),
    ("North Warehouse", 420, 8, false),
    ("Head Office", 95, 9, false),
];

pub async fn run(config: GridsealConfig, account: Identity) -> anyhow::Result<()> {
    let session = Arc::new(WalletSession::connected(account.clone()));
    let (client, chain) = AuditClient::local(&config, session.clone());

    if config.features.dev_mode {
        seed_samples(&chain, &account).await?;
    }
    if let Err(e) = client.refresh().await {
        log::warn!("Initial refresh failed: {}", e);
    }

    println!(" Gridseal console on {}", chain.contract());
    println!("   Connected as {}", account);
    println!("   Type `help` for commands.");

    let printer = spawn_status_printer(client.status());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&cmd, rest)) = words.split_first() else {
            continue;
        };

        match cmd {
            "connect" => {
                let identity = rest
                    .first()
                    .map(|a| Identity(a.to_string()))
                    .unwrap_or_else(|| account.clone());
                match session.current() {
                    Some(current) if current != identity => {
                        session.switch(identity.clone());
                        println!("🔌 Switched to {}", identity);
                    }
                    Some(_) => println!("🔌 Already connected as {}", identity),
                    None => {
                        session.connect(identity.clone());
                        println!("🔌 Connected as {}", identity);
                    }
                }
            }
            "disconnect" => {
                session.disconnect();
                println!("🔌 Disconnected");
            }
            "whoami" => match session.current() {
                Some(identity) => println!("{}", identity),
                None => println!("(not connected)"),
            },
            "submit" => {
                // submit <name...> <usage> <score>
                if rest.len() < 3 {
                    println!("Usage: submit <name> <usage> <score>");
                    continue;
                }
                let (name, tail) = rest.split_at(rest.len() - 2);
                match RecordDraft::parse(&name.join(" "), tail[0], tail[1]) {
                    Ok(draft) => {
                        if let Ok(id) = client.submit(&draft).await {
                            println!("📝 {}", id);
                        }
                    }
                    Err(e) => println!("❌ Invalid audit data: {}", e),
                }
            }
            "reveal" => {
                let Some(id) = rest.first() else {
                    println!("Usage: reveal <id>");
                    continue;
                };
                if let Ok(value) = client.reveal(&RecordId::from(*id)).await {
                    println!("🔓 {} = {} kWh", id, value);
                }
            }
            "list" => {
                if let Ok(snapshot) = client.refresh().await {
                    if snapshot.records.is_empty() {
                        println!("(no audits)");
                    }
                    for record in snapshot.records.iter() {
                        print_record(record);
                    }
                }
            }
            "search" => {
                let hits = client.search(&rest.join(" "));
                if hits.is_empty() {
                    println!("(no matches)");
                }
                for record in &hits {
                    print_record(record);
                }
            }
            "stats" => {
                let summary = client.summary();
                println!("   Total audits:   {}", summary.total);
                println!("   Verified:       {}", summary.verified);
                println!("   Average score:  {:.1}", summary.average_score);
                println!("   Recent:         {}", summary.recent);
            }
            "history" => {
                let recent = client.history().recent(HISTORY_SHOWN).await;
                if recent.is_empty() {
                    println!("(no activity)");
                }
                for activity in recent {
                    println!(
                        "   {}  {}",
                        activity.at.format("%Y-%m-%d %H:%M:%S"),
                        activity.message()
                    );
                }
            }
            "check" => {
                client.check_availability().await;
            }
            "help" => print_help(),
            "quit" | "exit" => break,
            other => println!("❌ Unknown command: {} (try `help`)", other),
        }
    }

    printer.finish().await;
    client.status().shutdown();
    Ok(())
}

async fn seed_samples(chain: &LocalChain, creator: &Identity) -> anyhow::Result<()> {
    for (n, (name, usage, score, verified)) in SAMPLE_AUDITS.iter().enumerate() {
        let id = RecordId(format!("audit-sample-{}", n + 1));
        chain
            .seed_record(creator, id, name, *usage, *score, *verified)
            .await?;
    }
    log::info!("Seeded {} sample audits", SAMPLE_AUDITS.len());
    Ok(())
}

fn print_help() {
    println!("COMMANDS:");
    println!("  connect [address]              Connect a wallet (default: start account)");
    println!("  disconnect                     Disconnect the wallet");
    println!("  whoami                         Show the connected account");
    println!("  submit <name> <usage> <score>  Create an encrypted audit");
    println!("  reveal <id>                    Decrypt and verify an audit's usage");
    println!("  list                           Reload and list all audits");
    println!("  search <term>                  Filter by name or id");
    println!("  stats                          Dashboard totals");
    println!("  history                        Last {} actions", HISTORY_SHOWN);
    println!("  check                          Check FHE service availability");
    println!("  quit                           Leave the console");
}
