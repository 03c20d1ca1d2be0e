//! Security tooling inventory
//!
//! Probes the host for the security tooling the agent family leans on and
//! renders a compact `<tooling>` block for system prompts, so the model
//! knows what exists without wasting turns on probing. The rendered block is
//! cached in an explicitly owned object with a TTL; the embedder creates and
//! refreshes it, there is no global state.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use tokio::process::Command;

struct ToolSpec {
    name: &'static str,
    category: &'static str,
    /// Candidate args to retrieve a short version string; tried in order
    version_args: &'static [&'static [&'static str]],
}

const TOOL_SPECS: &[ToolSpec] = &[
    // recon + vuln
    ToolSpec { name: "amass", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "subfinder", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "katana", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "dnsx", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "naabu", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "httpx", category: "recon", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "nuclei", category: "vuln", version_args: &[&["-version"], &["--version"]] },
    ToolSpec { name: "ffuf", category: "vuln", version_args: &[&["-V"], &["--version"]] },
    ToolSpec { name: "gobuster", category: "vuln", version_args: &[&["version"], &["--version"]] },
    ToolSpec { name: "nikto", category: "vuln", version_args: &[&["-Version"], &["-version"]] },
    ToolSpec { name: "sqlmap", category: "vuln", version_args: &[&["--version"]] },
    // network/protocol
    ToolSpec { name: "nmap", category: "net", version_args: &[&["--version"], &["-V"]] },
    ToolSpec { name: "masscan", category: "net", version_args: &[&["--version"], &["-V"]] },
    ToolSpec { name: "rustscan", category: "net", version_args: &[&["--version"], &["-V"]] },
    ToolSpec { name: "tcpdump", category: "net", version_args: &[&["--version"], &["-h"]] },
    ToolSpec { name: "tshark", category: "net", version_args: &[&["--version"]] },
    ToolSpec { name: "sslscan", category: "net", version_args: &[&["--version"], &["-h"]] },
    ToolSpec { name: "whois", category: "net", version_args: &[&["--version"], &["-h"]] },
    // auth/ad/smb + cracking
    ToolSpec { name: "hydra", category: "auth", version_args: &[&["-h"]] },
    ToolSpec { name: "john", category: "auth", version_args: &[&["--version"]] },
    ToolSpec { name: "hashcat", category: "auth", version_args: &[&["--version"]] },
    ToolSpec { name: "smbmap", category: "auth", version_args: &[&["-V"], &["--version"]] },
    // operator/misc
    ToolSpec { name: "searchsploit", category: "ops", version_args: &[&["--version"], &["-h"]] },
    ToolSpec { name: "binwalk", category: "ops", version_args: &[&["--version"], &["-h"]] },
    ToolSpec { name: "yara", category: "ops", version_args: &[&["--version"]] },
    ToolSpec { name: "trivy", category: "ops", version_args: &[&["--version"]] },
    ToolSpec { name: "semgrep", category: "ops", version_args: &[&["--version"]] },
    ToolSpec { name: "gitleaks", category: "ops", version_args: &[&["version"], &["--version"]] },
];

const CATEGORY_ORDER: &[&str] = &["recon", "vuln", "net", "auth", "ops"];

/// How many version probes run at once
const PROBE_CONCURRENCY: usize = 8;

fn short(s: &str, max: usize) -> String {
    let trimmed: String = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if trimmed.chars().count() <= max {
        return trimmed;
    }
    let mut cut: String = trimmed.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Locate an executable on `$PATH`
fn which(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path) {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

async fn probe_version(name: &str, candidates: &[&[&str]], timeout: Duration) -> Option<String> {
    for args in candidates {
        let output = tokio::time::timeout(
            timeout,
            Command::new(name)
                .args(*args)
                .stdin(std::process::Stdio::null())
                .output(),
        )
        .await;
        let Ok(Ok(output)) = output else { continue };
        let combined = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let first = combined.trim().lines().next().unwrap_or("").trim();
        if !first.is_empty() {
            return Some(short(first, 120));
        }
    }
    None
}

/// Explicitly owned, TTL-cached inventory of detected security tooling
pub struct ToolingInventory {
    ttl: Duration,
    probe_timeout: Duration,
    with_versions: bool,
    cached: Mutex<Option<(Instant, String)>>,
}

impl ToolingInventory {
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            probe_timeout: Duration::from_millis(600),
            with_versions: true,
            cached: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Skip the best-effort version probes (presence detection only)
    pub fn with_versions(mut self, enabled: bool) -> Self {
        self.with_versions = enabled;
        self
    }

    /// Drop the cached render so the next call re-probes
    pub fn invalidate(&self) {
        *self.cached.lock().unwrap() = None;
    }

    /// Render the `<tooling>` block, probing at most once per TTL window
    pub async fn render(&self) -> String {
        if let Some((at, text)) = self.cached.lock().unwrap().as_ref() {
            if at.elapsed() < self.ttl {
                return text.clone();
            }
        }

        let mut found: Vec<(usize, PathBuf, Option<String>)> = Vec::new();
        let mut missing = 0usize;
        for (index, spec) in TOOL_SPECS.iter().enumerate() {
            match which(spec.name) {
                Some(path) => found.push((index, path, None)),
                None => missing += 1,
            }
        }

        if self.with_versions {
            let timeout = self.probe_timeout;
            let versions: Vec<(usize, Option<String>)> = stream::iter(
                found
                    .iter()
                    .map(|(index, _, _)| *index)
                    .collect::<Vec<_>>(),
            )
            .map(|index| async move {
                let spec = &TOOL_SPECS[index];
                (index, probe_version(spec.name, spec.version_args, timeout).await)
            })
            .buffer_unordered(PROBE_CONCURRENCY)
            .collect()
            .await;
            for (index, version) in versions {
                if let Some(entry) = found.iter_mut().find(|(i, _, _)| *i == index) {
                    entry.2 = version;
                }
            }
        }

        let mut lines = Vec::new();
        lines.push("<tooling>".to_string());
        lines.push(format!(
            "  os: {} ({}/{})",
            std::env::consts::OS,
            std::env::consts::OS,
            std::env::consts::ARCH
        ));
        lines.push(format!("  detected_tools: {}", found.len()));
        lines.push(format!("  missing_tools: {missing}"));

        for category in CATEGORY_ORDER {
            let mut entries: Vec<String> = found
                .iter()
                .filter(|(index, _, _)| TOOL_SPECS[*index].category == *category)
                .map(|(index, _, version)| match version {
                    Some(v) => format!("{} ({v})", TOOL_SPECS[*index].name),
                    None => TOOL_SPECS[*index].name.to_string(),
                })
                .collect();
            if entries.is_empty() {
                continue;
            }
            entries.sort();
            lines.push(format!("  {category}: {}", short(&entries.join(", "), 900)));
        }
        lines.push("</tooling>".to_string());

        let text = lines.join("\n");
        *self.cached.lock().unwrap() = Some((Instant::now(), text.clone()));
        text
    }
}

impl Default for ToolingInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_shape() {
        let inventory = ToolingInventory::new().with_versions(false);
        let text = inventory.render().await;
        assert!(text.starts_with("<tooling>"));
        assert!(text.ends_with("</tooling>"));
        assert!(text.contains("detected_tools:"));
        assert!(text.contains("missing_tools:"));
    }

    #[tokio::test]
    async fn test_cache_within_ttl() {
        let inventory = ToolingInventory::new().with_versions(false);
        let first = inventory.render().await;
        let second = inventory.render().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_invalidate_forces_reprobe() {
        let inventory = ToolingInventory::new().with_versions(false);
        let _ = inventory.render().await;
        inventory.invalidate();
        assert!(inventory.cached.lock().unwrap().is_none());
        let again = inventory.render().await;
        assert!(again.contains("<tooling>"));
    }

    #[cfg(unix)]
    #[test]
    fn test_which_finds_shell() {
        assert!(which("sh").is_some());
        assert!(which("definitely-not-a-real-binary-name").is_none());
    }

    #[test]
    fn test_short_truncates_on_chars() {
        assert_eq!(short("abc", 10), "abc");
        let long = "x".repeat(50);
        let cut = short(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));
    }
}
