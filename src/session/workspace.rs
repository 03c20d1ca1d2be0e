//! Shared engagement workspace
//!
//! Sessions run by the security agent family coordinate through an on-disk
//! scaffold under `engagements/<id>/`: a shared findings log, cross-agent
//! handoff notes, evidence and report directories, and one subdirectory per
//! delegated child session. All writes are create-if-missing so re-running
//! against an existing engagement never clobbers collected artifacts.

use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::core::error::CoreResult;

/// Scaffold layout revision written into `run-metadata.json`
pub const SCAFFOLD_VERSION: &str = "v1";

/// Pointer to a shared engagement workspace on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEnv {
    /// Absolute engagement root
    pub root: PathBuf,
    /// `YYYY-MM-DD-<short session id>`
    pub engagement_id: String,
    /// Creation time, epoch millis
    pub created: i64,
    /// Session that opened the engagement
    pub root_session_id: String,
    pub scaffold_version: String,
}

fn short_session_id(session_id: &str) -> String {
    let normalized = session_id.strip_prefix("session_").unwrap_or(session_id);
    normalized.chars().take(8).collect()
}

impl WorkspaceEnv {
    /// Create a pointer for a new engagement rooted under `base`
    pub fn create(base: &Path, root_session_id: &str, created_millis: i64) -> Self {
        let date = Utc
            .timestamp_millis_opt(created_millis)
            .single()
            .unwrap_or_else(Utc::now)
            .format("%Y-%m-%d");
        let engagement_id = format!("{date}-{}", short_session_id(root_session_id));
        Self {
            root: base.join("engagements").join(&engagement_id),
            engagement_id,
            created: created_millis,
            root_session_id: root_session_id.to_string(),
            scaffold_version: SCAFFOLD_VERSION.to_string(),
        }
    }

    /// The shared findings log
    pub fn finding_path(&self) -> PathBuf {
        self.root.join("finding.md")
    }

    /// Cross-agent handoff notes
    pub fn handoff_path(&self) -> PathBuf {
        self.root.join("handoff.md")
    }

    /// A child session's private directory
    pub fn agent_dir(&self, session_id: &str) -> PathBuf {
        self.root.join("agents").join(session_id)
    }

    /// A child session's completion summary
    pub fn results_path(&self, session_id: &str) -> PathBuf {
        self.agent_dir(session_id).join("results.md")
    }
}

async fn write_if_missing(path: &Path, content: String) -> CoreResult<()> {
    match fs::try_exists(path).await {
        Ok(true) => Ok(()),
        _ => {
            fs::write(path, content).await?;
            Ok(())
        }
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

fn finding_header(session_id: &str, now: &str) -> String {
    [
        "# Engagement Findings",
        "",
        &format!("- Session: {session_id}"),
        &format!("- Started: {now}"),
        "",
        "## Findings",
        "",
        "_Append each validated finding below with timestamp, asset, severity, confidence, evidence, impact, and remediation._",
        "",
    ]
    .join("\n")
}

fn engagement_header(session_id: &str, now: &str) -> String {
    [
        "# Engagement",
        "",
        &format!("- Session: {session_id}"),
        &format!("- Created: {now}"),
        "",
        "## Scope",
        "- TODO",
        "",
        "## Authorization",
        "- TODO",
        "",
        "## Notes",
        "- TODO",
        "",
    ]
    .join("\n")
}

fn handoff_header(now: &str) -> String {
    [
        "# Handoff",
        "",
        &format!("- Created: {now}"),
        "",
        "## Coordination Notes",
        "- Record cross-agent dependencies and updates here.",
        "",
    ]
    .join("\n")
}

fn engagement_readme(env: &WorkspaceEnv, session_id: &str) -> String {
    let root = &env.root;
    [
        "# Engagement Workspace".to_string(),
        "".to_string(),
        format!("- Engagement ID: {}", env.engagement_id),
        format!("- Session: {session_id}"),
        "".to_string(),
        "## Audit Quickstart".to_string(),
        format!("- Findings log: {}", root.join("finding.md").display()),
        format!("- Cross-agent handoff: {}", root.join("handoff.md").display()),
        format!("- Reports: {}", root.join("reports").display()),
        format!("- Raw evidence: {}", root.join("evidence").join("raw").display()),
        format!(
            "- Processed evidence: {}",
            root.join("evidence").join("processed").display()
        ),
        "".to_string(),
        "## Subagent Outputs".to_string(),
        format!(
            "- Per-subagent summaries: {}",
            root.join("agents")
                .join("<subagent-session-id>")
                .join("results.md")
                .display()
        ),
        "".to_string(),
    ]
    .join("\n")
}

/// Ensure the shared engagement scaffold exists
pub async fn ensure_shared_scaffold(env: &WorkspaceEnv, session_id: &str) -> CoreResult<()> {
    let root = &env.root;
    let now = now_iso();
    fs::create_dir_all(root.join("evidence").join("raw")).await?;
    fs::create_dir_all(root.join("evidence").join("processed")).await?;
    fs::create_dir_all(root.join("reports")).await?;
    fs::create_dir_all(root.join("tmp")).await?;
    fs::create_dir_all(root.join("agents")).await?;

    write_if_missing(&root.join("finding.md"), finding_header(session_id, &now)).await?;
    write_if_missing(&root.join("engagement.md"), engagement_header(session_id, &now)).await?;
    write_if_missing(&root.join("handoff.md"), handoff_header(&now)).await?;
    write_if_missing(&root.join("README.md"), engagement_readme(env, session_id)).await?;

    let metadata = serde_json::json!({
        "session_id": session_id,
        "environment": {
            "engagement_id": env.engagement_id,
            "root_session_id": env.root_session_id,
            "scaffold_version": env.scaffold_version,
        },
        "generated_at": now,
    });
    write_if_missing(
        &root.join("run-metadata.json"),
        format!("{}\n", serde_json::to_string_pretty(&metadata)?),
    )
    .await?;
    Ok(())
}

/// Ensure a delegated child session's private workspace exists
///
/// Returns the child's directory.
pub async fn ensure_subagent_workspace(
    env: &WorkspaceEnv,
    session_id: &str,
) -> CoreResult<PathBuf> {
    let root = env.agent_dir(session_id);
    let now = now_iso();
    fs::create_dir_all(root.join("tmp")).await?;
    fs::create_dir_all(root.join("evidence")).await?;
    write_if_missing(
        &root.join("results.md"),
        [
            "# Subagent Results",
            "",
            &format!("- Session: {session_id}"),
            &format!("- Created: {now}"),
            "",
            "## Summary",
            "- TODO",
            "",
            "## Evidence Links",
            "- TODO",
            "",
        ]
        .join("\n"),
    )
    .await?;
    Ok(root)
}
