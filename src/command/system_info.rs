//! `!system` - bridge and host diagnostics for operators.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sysinfo::System;
use tracing::info;

use crate::bridge::MessageTimings;
use crate::command::Executor;
use crate::common::{Message, Sender};
use crate::config::SystemCommandConfig;

const MIB: u64 = 1024 * 1024;
const SECONDS_PER_DAY: u64 = 86_400;

/// Reports uptime, relay latency, memory and host details.
pub struct SystemInfo {
    timings: Arc<MessageTimings>,
    started: Instant,
    authorized: SystemCommandConfig,
}

impl SystemInfo {
    pub fn new(timings: Arc<MessageTimings>, authorized: SystemCommandConfig) -> Self {
        Self {
            timings,
            started: Instant::now(),
            authorized,
        }
    }

    /// Checks that the sender is on the allow-list.
    fn is_authorized(&self, sender: &Sender) -> bool {
        if let Some(account) = &sender.irc_account {
            if self.authorized.irc_accounts.iter().any(|a| a == account) {
                return true;
            }
        }

        if let Some(id) = sender.discord_id {
            if self.authorized.discord_ids.contains(&id) {
                return true;
            }
        }

        false
    }
}

impl Executor for SystemInfo {
    fn on_command(&self, command: &Message) -> Option<String> {
        if !self.is_authorized(&command.sender) {
            return None;
        }

        info!("System info requested by {}", command.sender.display_name);

        let mut sorted = self.timings.message_times();
        sorted.sort_unstable();

        let report = SystemReport {
            uptime: self.started.elapsed(),
            mean_latency: Duration::from_nanos(mean(&sorted)),
            median_latency: Duration::from_nanos(median(&sorted)),
            memory: collect_memory(),
            runtime: format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            os: os_description(),
        };

        Some(report.to_string())
    }
}

/// Process and host memory in bytes.
#[derive(Debug, Clone, Copy, Default)]
struct MemorySnapshot {
    process: u64,
    total: u64,
}

fn collect_memory() -> MemorySnapshot {
    let mut sys = System::new();
    sys.refresh_memory();
    let pid = sysinfo::get_current_pid().ok();
    if let Some(pid) = pid {
        sys.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::Some(&[pid]),
            false,
            sysinfo::ProcessRefreshKind::nothing().with_memory(),
        );
    }
    let process = pid
        .and_then(|p| sys.process(p))
        .map(|p| p.memory())
        .unwrap_or(0);

    MemorySnapshot {
        process,
        total: sys.total_memory(),
    }
}

fn os_description() -> String {
    format!(
        "{} {} ({})",
        System::name().unwrap_or_else(|| "unknown".to_string()),
        System::os_version().unwrap_or_default(),
        std::env::consts::ARCH
    )
}

struct SystemReport {
    uptime: Duration,
    mean_latency: Duration,
    median_latency: Duration,
    memory: MemorySnapshot,
    runtime: String,
    os: String,
}

impl std::fmt::Display for SystemReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Uptime: {} days", self.uptime.as_secs() / SECONDS_PER_DAY)?;
        writeln!(
            f,
            "Message Handling (mean/median): {}ms / {}ms",
            self.mean_latency.as_millis(),
            self.median_latency.as_millis()
        )?;
        writeln!(
            f,
            "Memory: {} / {} (MiB)",
            self.memory.process / MIB,
            self.memory.total / MIB
        )?;
        writeln!(f, "Runtime: {}", self.runtime)?;
        write!(f, "OS: {}", self.os)
    }
}

/// Integer mean of the samples, 0 when there are none.
fn mean(samples: &[u64]) -> u64 {
    if samples.is_empty() {
        return 0;
    }
    let sum: u128 = samples.iter().map(|s| *s as u128).sum();
    (sum / samples.len() as u128) as u64
}

/// Median of sorted samples, truncating the average of the middle pair.
fn median(sorted: &[u64]) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let middle = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[middle]
    } else {
        ((sorted[middle - 1] as u128 + sorted[middle] as u128) / 2) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Channel, Source, SourceIdentity};

    fn executor() -> SystemInfo {
        SystemInfo::new(
            Arc::new(MessageTimings::new(16)),
            SystemCommandConfig {
                irc_accounts: vec!["admin".to_string()],
                discord_ids: vec![107387791683416064],
            },
        )
    }

    fn irc_command(nick: &str, account: Option<&str>) -> Message {
        Message::new(
            "!system",
            Sender::irc(nick, account.map(str::to_string)),
            Source {
                channel: Channel::irc("#ops"),
                identity: SourceIdentity::Nick(nick.to_string()),
            },
        )
    }

    #[test]
    fn test_mean_and_median() {
        assert_eq!(mean(&[2, 4, 6]), 4);
        assert_eq!(median(&[1, 2, 3, 4]), 2);
        assert_eq!(median(&[1, 5, 9]), 5);
        assert_eq!(mean(&[1, 2]), 1);
    }

    #[test]
    fn test_empty_samples_report_zero() {
        assert_eq!(mean(&[]), 0);
        assert_eq!(median(&[]), 0);
    }

    #[test]
    fn test_authorized_irc_account_gets_report() {
        let reply = executor()
            .on_command(&irc_command("anyone", Some("admin")))
            .unwrap();

        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "Uptime: 0 days");
        assert_eq!(lines[1], "Message Handling (mean/median): 0ms / 0ms");
        assert!(lines[2].starts_with("Memory: "));
        assert!(lines[3].starts_with("Runtime: harbor "));
        assert!(lines[4].starts_with("OS: "));
    }

    #[test]
    fn test_authorized_discord_id_gets_report() {
        let command = Message::new(
            "!system",
            Sender::discord("zach", 107387791683416064),
            Source {
                channel: Channel::discord(1, "ops", None),
                identity: SourceIdentity::Snowflake(107387791683416064),
            },
        );
        assert!(executor().on_command(&command).is_some());
    }

    #[test]
    fn test_nick_alone_is_not_authorization() {
        assert!(executor().on_command(&irc_command("admin", None)).is_none());
        assert!(executor()
            .on_command(&irc_command("admin", Some("someone")))
            .is_none());
    }

    #[test]
    fn test_report_uses_recorded_latency() {
        let timings = Arc::new(MessageTimings::new(16));
        let message = irc_command("x", None);
        for ms in [2u64, 4, 6] {
            timings.add_to_timing(&message, message.received_at + Duration::from_millis(ms));
        }
        let executor = SystemInfo::new(
            timings,
            SystemCommandConfig {
                irc_accounts: vec!["admin".to_string()],
                discord_ids: Vec::new(),
            },
        );

        let reply = executor
            .on_command(&irc_command("anyone", Some("admin")))
            .unwrap();
        assert!(reply.contains("(mean/median): 4ms / 4ms"));
    }
}
