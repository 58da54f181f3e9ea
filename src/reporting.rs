use crate::models::QualityLevel;
use crate::submission::{KycSubmission, SubmissionStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Stored validation scores bucketed at 80 / 60 / 40.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityDistribution {
    pub excellent: usize,
    pub good: usize,
    pub acceptable: usize,
    pub poor: usize,
}

impl QualityDistribution {
    pub fn add(&mut self, validation_score: f64) {
        match QualityLevel::from_score(validation_score) {
            QualityLevel::Excellent => self.excellent += 1,
            QualityLevel::Good => self.good += 1,
            QualityLevel::Acceptable => self.acceptable += 1,
            QualityLevel::Poor => self.poor += 1,
        }
    }

    pub fn from_scores<I: IntoIterator<Item = f64>>(scores: I) -> Self {
        let mut distribution = QualityDistribution::default();
        for score in scores {
            distribution.add(score);
        }
        distribution
    }

    pub fn total(&self) -> usize {
        self.excellent + self.good + self.acceptable + self.poor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOverview {
    pub total_submissions: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub approval_rate: f64,
    pub avg_processing_time_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTypeCount {
    #[serde(rename = "type")]
    pub id_type: String,
    pub count: usize,
}

/// Review turnaround of decided submissions, in hours. All zero when
/// nothing has been reviewed yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTimes {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

impl ProcessingTimes {
    pub fn from_hours(hours: &[f64]) -> Self {
        if hours.is_empty() {
            return ProcessingTimes::default();
        }
        let min = hours.iter().copied().fold(f64::INFINITY, f64::min);
        let max = hours.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        ProcessingTimes {
            average: round2(hours.iter().sum::<f64>() / hours.len() as f64),
            min: round2(min),
            max: round2(max),
        }
    }
}

/// Submissions created on one calendar day (UTC), by current status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyActivity {
    pub date: NaiveDate,
    pub submitted: usize,
    pub approved: usize,
    pub rejected: usize,
    pub pending: usize,
}

/// Per-day submission counts in date order, optionally limited to
/// submissions created at or after `since`.
pub fn daily_activity(submissions: &[KycSubmission], since: Option<DateTime<Utc>>) -> Vec<DailyActivity> {
    let mut days: Vec<DailyActivity> = Vec::new();
    for submission in submissions {
        if since.map_or(false, |cutoff| submission.created_at < cutoff) {
            continue;
        }
        let date = submission.created_at.date_naive();
        let slot = match days.iter().position(|d| d.date == date) {
            Some(pos) => pos,
            None => {
                days.push(DailyActivity { date, submitted: 0, approved: 0, rejected: 0, pending: 0 });
                days.len() - 1
            }
        };
        let day = &mut days[slot];
        day.submitted += 1;
        match submission.status {
            SubmissionStatus::Approved => day.approved += 1,
            SubmissionStatus::Rejected => day.rejected += 1,
            SubmissionStatus::Pending => day.pending += 1,
        }
    }
    days.sort_by_key(|d| d.date);
    days
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycStatistics {
    pub overview: SubmissionOverview,
    pub processing_times: ProcessingTimes,
    pub timeline: Vec<DailyActivity>,
    pub id_type_distribution: Vec<IdTypeCount>,
    pub quality_distribution: QualityDistribution,
}

impl KycStatistics {
    pub fn from_submissions(submissions: &[KycSubmission]) -> Self {
        let count = |status: SubmissionStatus| submissions.iter().filter(|s| s.status == status).count();
        let approved = count(SubmissionStatus::Approved);
        let rejected = count(SubmissionStatus::Rejected);

        // approval rate over decided submissions only
        let processed = approved + rejected;
        let approval_rate = if processed > 0 {
            approved as f64 / processed as f64 * 100.0
        } else {
            0.0
        };

        let hours: Vec<f64> = submissions
            .iter()
            .filter(|s| s.status != SubmissionStatus::Pending)
            .filter_map(|s| s.processing_hours())
            .collect();
        let processing_times = ProcessingTimes::from_hours(&hours);

        let mut id_type_distribution: Vec<IdTypeCount> = Vec::new();
        for submission in submissions {
            let id_type = submission.id_type.as_str();
            match id_type_distribution.iter_mut().find(|c| c.id_type == id_type) {
                Some(entry) => entry.count += 1,
                None => id_type_distribution.push(IdTypeCount { id_type: id_type.to_string(), count: 1 }),
            }
        }
        id_type_distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.id_type.cmp(&b.id_type)));

        KycStatistics {
            overview: SubmissionOverview {
                total_submissions: submissions.len(),
                pending: count(SubmissionStatus::Pending),
                approved,
                rejected,
                approval_rate: round2(approval_rate),
                avg_processing_time_hours: processing_times.average,
            },
            processing_times,
            timeline: daily_activity(submissions, None),
            id_type_distribution,
            quality_distribution: QualityDistribution::from_scores(
                submissions.iter().map(|s| s.analysis.validation_score),
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub details: serde_json::Value,
}

/// Review timeline of one submission: upload, automatic analysis and, when
/// present, the review decision.
pub fn timeline(submission: &KycSubmission) -> Vec<TimelineEvent> {
    let mut events = vec![
        TimelineEvent {
            event: "submitted".to_string(),
            timestamp: submission.created_at,
            description: format!("User submitted {} documents", submission.id_type),
            details: json!({
                "files_count": submission.file_ids.len(),
                "id_type": submission.id_type.as_str(),
            }),
        },
        TimelineEvent {
            event: "analyzed".to_string(),
            timestamp: submission.analysis.analyzed_at,
            description: "Automatic document analysis completed".to_string(),
            details: json!({
                "validation_score": submission.analysis.validation_score,
                "quality_score": submission.analysis.quality_score(),
                "auto_approved": submission.analysis.auto_approved,
            }),
        },
    ];

    if let Some(reviewed_at) = submission.reviewed_at {
        let by = if submission.analysis.auto_approved && submission.status == SubmissionStatus::Approved {
            "automatically"
        } else {
            "by admin"
        };
        events.push(TimelineEvent {
            event: submission.status.to_string(),
            timestamp: reviewed_at,
            description: format!("KYC {} {}", submission.status, by),
            details: json!({
                "admin_note": submission.admin_note,
                "status": submission.status,
            }),
        });
    }

    events
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IdType;
    use crate::submission::{KycStatus, SubmissionAnalysis};
    use chrono::{Duration, TimeZone};

    fn submission(id_type: &str, score: f64, status: SubmissionStatus, review_hours: Option<i64>) -> KycSubmission {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        KycSubmission {
            id: format!("{}-{}", id_type, score),
            id_type: IdType::from(id_type),
            file_ids: vec!["a".to_string(), "b".to_string()],
            status,
            kyc_status: KycStatus::Pending,
            created_at,
            reviewed_at: review_hours.map(|h| created_at + Duration::hours(h)),
            admin_note: None,
            analysis: SubmissionAnalysis {
                validation_score: score,
                auto_approved: score >= 80.0,
                requires_manual_review: score < 80.0,
                file_analyses: Vec::new(),
                analyzed_at: created_at,
            },
        }
    }

    #[test]
    fn test_distribution_buckets() {
        let d = QualityDistribution::from_scores([100.0, 80.0, 79.99, 60.0, 40.0, 39.5, 0.0]);
        assert_eq!(d, QualityDistribution { excellent: 2, good: 2, acceptable: 1, poor: 2 });
        assert_eq!(d.total(), 7);
    }

    #[test]
    fn test_statistics_overview() {
        let subs = vec![
            submission("passport", 100.0, SubmissionStatus::Approved, Some(0)),
            submission("passport", 70.0, SubmissionStatus::Approved, Some(4)),
            submission("national_id", 30.0, SubmissionStatus::Rejected, Some(2)),
            submission("driver_license", 60.0, SubmissionStatus::Pending, None),
        ];
        let stats = KycStatistics::from_submissions(&subs);

        assert_eq!(stats.overview.total_submissions, 4);
        assert_eq!(stats.overview.pending, 1);
        assert_eq!(stats.overview.approved, 2);
        assert_eq!(stats.overview.rejected, 1);
        assert_eq!(stats.overview.approval_rate, 66.67);
        assert_eq!(stats.overview.avg_processing_time_hours, 2.0);
        assert_eq!(stats.processing_times, ProcessingTimes { average: 2.0, min: 0.0, max: 4.0 });
        assert_eq!(
            stats.id_type_distribution[0],
            IdTypeCount { id_type: "passport".to_string(), count: 2 }
        );
        assert_eq!(stats.quality_distribution, QualityDistribution { excellent: 1, good: 2, acceptable: 0, poor: 1 });
    }

    #[test]
    fn test_empty_statistics() {
        let stats = KycStatistics::from_submissions(&[]);
        assert_eq!(stats.overview.approval_rate, 0.0);
        assert_eq!(stats.quality_distribution.total(), 0);
        assert!(stats.id_type_distribution.is_empty());
        assert_eq!(stats.processing_times, ProcessingTimes::default());
        assert!(stats.timeline.is_empty());
    }

    #[test]
    fn test_processing_times_round_to_two_places() {
        let times = ProcessingTimes::from_hours(&[1.0 / 3.0, 2.5, 10.126]);
        assert_eq!(times.min, 0.33);
        assert_eq!(times.max, 10.13);
        assert_eq!(times.average, 4.32);
    }

    #[test]
    fn test_daily_activity_groups_by_creation_day() {
        let mut subs = vec![
            submission("passport", 100.0, SubmissionStatus::Approved, Some(0)),
            submission("passport", 60.0, SubmissionStatus::Pending, None),
            submission("national_id", 30.0, SubmissionStatus::Rejected, Some(2)),
            submission("passport", 90.0, SubmissionStatus::Approved, Some(1)),
        ];
        subs[2].created_at = subs[2].created_at - Duration::days(1);
        subs[3].created_at = subs[3].created_at + Duration::days(3);

        let days = daily_activity(&subs, None);
        let dates: Vec<String> = days.iter().map(|d| d.date.to_string()).collect();
        assert_eq!(dates, ["2026-03-01", "2026-03-02", "2026-03-05"]);
        assert_eq!(
            days[1],
            DailyActivity {
                date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
                submitted: 2,
                approved: 1,
                rejected: 0,
                pending: 1,
            }
        );
        assert_eq!(days[0].rejected, 1);

        let cutoff = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let recent = daily_activity(&subs, Some(cutoff));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent.iter().map(|d| d.submitted).sum::<usize>(), 3);

        let json = serde_json::to_value(&days[0]).unwrap();
        assert_eq!(json["date"], "2026-03-01");
    }

    #[test]
    fn test_timeline_events() {
        let pending = submission("passport", 60.0, SubmissionStatus::Pending, None);
        let events = timeline(&pending);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].description, "User submitted passport documents");
        assert_eq!(events[1].description, "Automatic document analysis completed");
        assert_eq!(events[1].details["validation_score"], 60.0);
        assert_eq!(events[1].details["auto_approved"], false);
        assert!(events[1].details["quality_score"].is_null());

        let mut approved = submission("passport", 100.0, SubmissionStatus::Approved, Some(0));
        approved.admin_note = Some("Automatically approved based on quality analysis".to_string());
        let events = timeline(&approved);
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].event, "approved");
        assert_eq!(events[2].description, "KYC approved automatically");
        assert_eq!(events[2].details["status"], "approved");
    }
}
