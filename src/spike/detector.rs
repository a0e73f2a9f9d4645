//! Usage spike detection.
//!
//! Compares each project's current-period usage against its trailing
//! baseline, classifies the ratio on an ascending severity ladder, and
//! escalates: warning-tier sends a notification, suspension-tier and
//! above suspend the project when the breached cap is hard. Every run
//! is summarized to the audit log whether or not any action was taken.

use crate::audit::AuditLogger;
use crate::config::SpikeConfig;
use crate::db;
use crate::domain::audit::{AuditEvent, LogType, Severity};
use crate::domain::suspension::SuspensionReason;
use crate::errors::Result;
use crate::notify::{NotificationKind, Notifier};
use crate::observability::metrics;
use crate::quota::{self, LiftOutcome, SuspendOutcome};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// Severity tiers, ascending. The ladder itself is fixed; the
/// multiplier for each rung is configuration.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SpikeSeverity {
    Warning,
    Suspension,
    Critical,
}

impl SpikeSeverity {
    pub fn as_str(&self) -> &str {
        match self {
            SpikeSeverity::Warning => "warning",
            SpikeSeverity::Suspension => "suspension",
            SpikeSeverity::Critical => "critical",
        }
    }
}

/// One detected spike, summarized into the audit trail
#[derive(Debug, Clone, Serialize)]
pub struct SpikeDetection {
    pub project_id: Uuid,
    pub cap_type: String,
    pub current_usage: i64,
    pub average_usage: f64,
    pub spike_multiplier: f64,
    pub severity: SpikeSeverity,
    pub action_taken: String,
    pub detected_at: DateTime<Utc>,
}

/// Outcome of one detection run
#[derive(Debug, Clone, Serialize)]
pub struct SpikeDetectionReport {
    pub success: bool,
    pub projects_checked: usize,
    pub projects_skipped: usize,
    pub spikes_detected: usize,
    pub warnings: usize,
    pub suspensions: usize,
    pub detected_spikes: Vec<SpikeDetection>,
}

/// Baseline for spike comparison: the trailing daily average, or the
/// configured limit when the project has no history, so a zero-to-large
/// spike still classifies without dividing by zero
pub fn compute_baseline(trailing_total: i64, baseline_days: u32, limit_value: i64) -> f64 {
    let average = if baseline_days > 0 {
        trailing_total as f64 / baseline_days as f64
    } else {
        0.0
    };

    if average > 0.0 {
        average
    } else {
        limit_value as f64
    }
}

/// Classify a usage multiple on the configured ladder, highest rung wins
pub fn classify(multiplier: f64, config: &SpikeConfig) -> Option<SpikeSeverity> {
    if multiplier >= config.critical_multiplier {
        Some(SpikeSeverity::Critical)
    } else if multiplier >= config.suspension_multiplier {
        Some(SpikeSeverity::Suspension)
    } else if multiplier >= config.warning_multiplier {
        Some(SpikeSeverity::Warning)
    } else {
        None
    }
}

pub struct SpikeDetector {
    pool: PgPool,
    audit: Arc<AuditLogger>,
    notifier: Arc<Notifier>,
    config: SpikeConfig,
}

impl SpikeDetector {
    pub fn new(
        pool: PgPool,
        audit: Arc<AuditLogger>,
        notifier: Arc<Notifier>,
        config: SpikeConfig,
    ) -> Self {
        Self {
            pool,
            audit,
            notifier,
            config,
        }
    }

    /// Scan every capped project. A storage failure on one project is
    /// logged and skipped; the rest of the batch continues.
    pub async fn run(&self) -> SpikeDetectionReport {
        let started = std::time::Instant::now();
        let now = Utc::now();

        let project_ids = match db::quotas::list_capped_project_ids(&self.pool).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(error = %e, "Spike detection could not list projects");
                return SpikeDetectionReport {
                    success: false,
                    projects_checked: 0,
                    projects_skipped: 0,
                    spikes_detected: 0,
                    warnings: 0,
                    suspensions: 0,
                    detected_spikes: Vec::new(),
                };
            }
        };

        let mut report = SpikeDetectionReport {
            success: true,
            projects_checked: 0,
            projects_skipped: 0,
            spikes_detected: 0,
            warnings: 0,
            suspensions: 0,
            detected_spikes: Vec::new(),
        };

        for project_id in project_ids {
            match self.check_project(project_id, now).await {
                Ok(spikes) => {
                    report.projects_checked += 1;
                    for spike in spikes {
                        report.spikes_detected += 1;
                        match spike.action_taken.as_str() {
                            "warning_notification" => report.warnings += 1,
                            "suspended" => report.suspensions += 1,
                            _ => {}
                        }
                        report.detected_spikes.push(spike);
                    }
                }
                Err(e) => {
                    report.projects_skipped += 1;
                    tracing::error!(
                        project_id = %project_id,
                        error = %e,
                        "Spike detection failed for project, skipping"
                    );
                }
            }
        }

        metrics::record_spike_run(report.spikes_detected, report.suspensions);
        metrics::observe_spike_run_duration(started.elapsed().as_secs_f64());

        let summary = AuditEvent::new(LogType::BackgroundJob, Severity::Info, "spike_detection_run")
            .with_details(serde_json::json!({
                "projects_checked": report.projects_checked,
                "projects_skipped": report.projects_skipped,
                "spikes_detected": report.spikes_detected,
                "warnings": report.warnings,
                "suspensions": report.suspensions,
                "duration_ms": started.elapsed().as_millis() as u64,
            }));
        let _ = self.audit.log(summary).await;

        tracing::info!(
            projects_checked = report.projects_checked,
            spikes_detected = report.spikes_detected,
            warnings = report.warnings,
            suspensions = report.suspensions,
            "Spike detection run complete"
        );

        report
    }

    /// Evaluate one project across all of its caps
    async fn check_project(
        &self,
        project_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SpikeDetection>> {
        // A suspended project whose usage dropped back under the limit
        // is restored before evaluation
        if let LiftOutcome::Lifted = quota::recheck_suspended(&self.pool, project_id, now).await? {
            let event =
                AuditEvent::new(LogType::Unsuspension, Severity::Info, "auto_unsuspend")
                    .with_project(project_id)
                    .with_details(serde_json::json!({"trigger": "usage_recheck"}));
            let _ = self.audit.log(event).await;
        }

        let caps = db::quotas::get_caps(&self.pool, project_id).await?;
        let mut detections = Vec::new();

        for cap in caps {
            let current =
                db::quotas::current_period_usage(&self.pool, project_id, &cap.cap_type, now)
                    .await?;
            if current == 0 {
                continue;
            }

            let trailing = db::quotas::trailing_usage_total(
                &self.pool,
                project_id,
                &cap.cap_type,
                now,
                self.config.baseline_days,
            )
            .await?;

            let baseline = compute_baseline(trailing, self.config.baseline_days, cap.limit_value);
            if baseline <= 0.0 {
                // No history and no limit to compare against
                continue;
            }

            let multiplier = current as f64 / baseline;
            let Some(severity) = classify(multiplier, &self.config) else {
                continue;
            };

            let average_usage = trailing as f64 / self.config.baseline_days as f64;
            let action = self
                .take_action(project_id, &cap.cap_type, cap.limit_value, cap.hard_cap, current, multiplier, severity)
                .await?;

            detections.push(SpikeDetection {
                project_id,
                cap_type: cap.cap_type.clone(),
                current_usage: current,
                average_usage,
                spike_multiplier: multiplier,
                severity,
                action_taken: action,
                detected_at: now,
            });
        }

        Ok(detections)
    }

    #[allow(clippy::too_many_arguments)]
    async fn take_action(
        &self,
        project_id: Uuid,
        cap_type: &str,
        limit_value: i64,
        hard_cap: bool,
        current_usage: i64,
        multiplier: f64,
        severity: SpikeSeverity,
    ) -> Result<String> {
        let details = serde_json::json!({
            "cap_type": cap_type,
            "current_usage": current_usage,
            "limit_value": limit_value,
            "spike_multiplier": multiplier,
            "severity": severity.as_str(),
        });

        if severity >= SpikeSeverity::Suspension && hard_cap {
            let reason = SuspensionReason {
                cap_type: cap_type.to_string(),
                current_value: current_usage,
                limit_exceeded: limit_value,
                details: format!("usage spike {:.1}x baseline", multiplier),
            };

            return match quota::suspend_project(&self.pool, project_id, &reason, true).await? {
                SuspendOutcome::Suspended(suspension_id) => {
                    let audit_severity = if severity == SpikeSeverity::Critical {
                        Severity::Critical
                    } else {
                        Severity::Error
                    };
                    let event =
                        AuditEvent::new(LogType::Suspension, audit_severity, "auto_suspend")
                            .with_project(project_id)
                            .with_details(serde_json::json!({
                                "suspension_id": suspension_id,
                                "cap_type": cap_type,
                                "current_value": current_usage,
                                "limit_exceeded": limit_value,
                                "spike_multiplier": multiplier,
                            }));
                    let _ = self.audit.log(event).await;

                    self.notifier
                        .notify_project(
                            project_id,
                            NotificationKind::ProjectSuspended,
                            cap_type,
                            details,
                        )
                        .await?;

                    Ok("suspended".to_string())
                }
                SuspendOutcome::AlreadySuspended => {
                    // Idempotent under overlapping runs: the existing
                    // unresolved suspension stands
                    Ok("already_suspended".to_string())
                }
            };
        }

        // Warning tier, or a suspend-tier hit on a soft cap
        let event = AuditEvent::new(LogType::BackgroundJob, Severity::Warning, "usage_warning")
            .with_project(project_id)
            .with_details(details.clone());
        let _ = self.audit.log(event).await;

        self.notifier
            .notify_project(project_id, NotificationKind::UsageWarning, cap_type, details)
            .await?;

        Ok("warning_notification".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier_config() -> SpikeConfig {
        SpikeConfig {
            enabled: true,
            interval_seconds: 300,
            baseline_days: 7,
            warning_multiplier: 2.0,
            suspension_multiplier: 5.0,
            critical_multiplier: 10.0,
        }
    }

    #[test]
    fn test_classify_ladder() {
        let config = tier_config();

        assert_eq!(classify(1.0, &config), None);
        assert_eq!(classify(1.99, &config), None);
        assert_eq!(classify(2.0, &config), Some(SpikeSeverity::Warning));
        assert_eq!(classify(4.99, &config), Some(SpikeSeverity::Warning));
        assert_eq!(classify(5.0, &config), Some(SpikeSeverity::Suspension));
        assert_eq!(classify(9.99, &config), Some(SpikeSeverity::Suspension));
        assert_eq!(classify(10.0, &config), Some(SpikeSeverity::Critical));
        assert_eq!(classify(250.0, &config), Some(SpikeSeverity::Critical));
    }

    #[test]
    fn test_severity_ordering() {
        assert!(SpikeSeverity::Warning < SpikeSeverity::Suspension);
        assert!(SpikeSeverity::Suspension < SpikeSeverity::Critical);
    }

    #[test]
    fn test_baseline_from_history() {
        // 70k over 7 days -> 10k/day
        assert_eq!(compute_baseline(70_000, 7, 10_000), 10_000.0);
    }

    #[test]
    fn test_zero_history_uses_limit_as_baseline() {
        // No division by zero, and a zero-to-large spike still
        // classifies against the limit
        let baseline = compute_baseline(0, 7, 10_000);
        assert_eq!(baseline, 10_000.0);

        let config = tier_config();
        let multiplier = 55_000.0 / baseline;
        assert_eq!(classify(multiplier, &config), Some(SpikeSeverity::Suspension));
    }

    #[test]
    fn test_example_scenario_five_and_a_half_times() {
        // 55k current against a 10k baseline average: 5.5x, suspend tier
        let config = tier_config();
        let baseline = compute_baseline(70_000, 7, 10_000);
        let multiplier = 55_000.0 / baseline;

        assert!((multiplier - 5.5).abs() < f64::EPSILON);
        assert_eq!(classify(multiplier, &config), Some(SpikeSeverity::Suspension));
    }
}
