//! Aggregates over attendance records.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;

use crate::database::{AttendanceRecord, ClassRecord};
use crate::types::{
    AttendanceMethod, AttendanceStatistics, AttendanceStatus, ClassStatistics, TrendDirection,
    TrendPoint, TrendSummary,
};

/// Days counted as "recent" by [`trend_direction`].
const RECENT_TREND_DAYS: usize = 7;
/// Rate change, in percentage points, needed to leave `Stable`.
const TREND_MARGIN: f64 = 5.0;

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage of `held` sessions attended, capped at 100.
pub fn attendance_rate(attended: u64, held: u64) -> f64 {
    if held == 0 {
        return 0.0;
    }
    round2((attended as f64 / held as f64 * 100.0).min(100.0))
}

fn count_where(records: &[AttendanceRecord], pred: impl Fn(&AttendanceRecord) -> bool) -> u64 {
    records.iter().filter(|r| pred(r)).count() as u64
}

pub fn attendance_statistics(records: &[AttendanceRecord]) -> AttendanceStatistics {
    let total = records.len() as u64;
    let verified = count_where(records, |r| r.is_verified);
    let scores: Vec<f64> = records
        .iter()
        .filter(|r| r.method == AttendanceMethod::FaceRecognition)
        .filter_map(|r| r.confidence_score)
        .collect();

    AttendanceStatistics {
        total_attendance: total,
        face_recognition_count: count_where(records, |r| {
            r.method == AttendanceMethod::FaceRecognition
        }),
        qr_code_count: count_where(records, |r| r.method == AttendanceMethod::QrCode),
        verified_count: verified,
        late_count: count_where(records, |r| r.status == AttendanceStatus::Late),
        verification_rate: if total == 0 {
            0.0
        } else {
            round2(verified as f64 / total as f64 * 100.0)
        },
        average_confidence: if scores.is_empty() {
            None
        } else {
            Some((scores.iter().sum::<f64>() / scores.len() as f64 * 1000.0).round() / 1000.0)
        },
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Groups records by class and calendar day (UTC), ordered by day then class.
///
/// `capacity` maps class ids to their `max_students`; classes missing from it
/// count the day's distinct attendees instead.
pub fn daily_trends(records: &[AttendanceRecord], capacity: &HashMap<i64, u64>) -> Vec<TrendPoint> {
    let mut days: BTreeMap<(NaiveDate, i64), Vec<&AttendanceRecord>> = BTreeMap::new();
    for record in records {
        days.entry((record.timestamp.date_naive(), record.class_id))
            .or_default()
            .push(record);
    }

    days.into_iter()
        .map(|((date, class_id), day)| {
            let present = day.len() as u64;
            let total = capacity.get(&class_id).copied().unwrap_or_else(|| {
                day.iter().map(|r| r.user_id).collect::<HashSet<_>>().len() as u64
            });
            let scores: Vec<f64> = day.iter().filter_map(|r| r.confidence_score).collect();
            let count = |pred: fn(&AttendanceRecord) -> bool| {
                day.iter().filter(|r| pred(r)).count() as u64
            };
            TrendPoint {
                class_id,
                date,
                total_students: total,
                present_count: present,
                absent_count: total.saturating_sub(present),
                late_count: count(|r| r.status == AttendanceStatus::Late),
                attendance_rate: attendance_rate(present, total.max(1)),
                face_recognition_count: count(|r| r.method == AttendanceMethod::FaceRecognition),
                qr_code_count: count(|r| r.method == AttendanceMethod::QrCode),
                verified_count: count(|r| r.is_verified),
                average_confidence_score: mean(&scores).map(round3),
            }
        })
        .collect()
}

/// Compares the mean rate of the last seven points with the mean of the
/// points before them.
pub fn trend_direction(points: &[TrendPoint]) -> TrendDirection {
    if points.len() <= RECENT_TREND_DAYS {
        return TrendDirection::Stable;
    }
    let (older, recent) = points.split_at(points.len() - RECENT_TREND_DAYS);
    let rates = |ps: &[TrendPoint]| ps.iter().map(|p| p.attendance_rate).collect::<Vec<_>>();
    let (Some(recent), Some(older)) = (mean(&rates(recent)), mean(&rates(older))) else {
        return TrendDirection::Stable;
    };
    let difference = recent - older;
    if difference > TREND_MARGIN {
        TrendDirection::Improving
    } else if difference < -TREND_MARGIN {
        TrendDirection::Declining
    } else {
        TrendDirection::Stable
    }
}

pub fn trend_summary(points: &[TrendPoint]) -> Option<TrendSummary> {
    let rates: Vec<f64> = points.iter().map(|p| p.attendance_rate).collect();
    let average_rate = mean(&rates)?;
    let scores: Vec<f64> = points.iter().filter_map(|p| p.average_confidence_score).collect();
    let total = |field: fn(&TrendPoint) -> u64| points.iter().map(field).sum::<u64>();
    Some(TrendSummary {
        total_days: points.len(),
        average_attendance_rate: round2(average_rate),
        total_students: total(|p| p.total_students),
        total_present: total(|p| p.present_count),
        total_absent: total(|p| p.absent_count),
        total_late: total(|p| p.late_count),
        average_confidence_score: mean(&scores).map(round3),
        trend_direction: trend_direction(points),
    })
}

pub fn class_statistics(class: &ClassRecord, records: &[AttendanceRecord]) -> ClassStatistics {
    let summary = attendance_statistics(records);
    ClassStatistics {
        total_attendance: summary.total_attendance,
        face_recognition_count: summary.face_recognition_count,
        qr_code_count: summary.qr_code_count,
        verified_count: summary.verified_count,
        late_count: summary.late_count,
        max_students: class.max_students,
        attendance_rate: class
            .max_students
            .filter(|&max| max > 0)
            .map(|max| attendance_rate(summary.total_attendance, max as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(
        method: AttendanceMethod,
        status: AttendanceStatus,
        verified: bool,
        score: Option<f64>,
    ) -> AttendanceRecord {
        AttendanceRecord {
            id: 1,
            user_id: 1,
            class_id: 1,
            timestamp: Utc::now(),
            method,
            confidence_score: score,
            photo_path: None,
            ip_address: None,
            device_info: None,
            status,
            is_verified: verified,
            verified_by: None,
            verified_at: None,
            notes: None,
        }
    }

    fn point(rate: f64) -> TrendPoint {
        TrendPoint {
            class_id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            total_students: 10,
            present_count: (rate / 10.0) as u64,
            absent_count: 10 - (rate / 10.0) as u64,
            late_count: 0,
            attendance_rate: rate,
            face_recognition_count: 0,
            qr_code_count: 0,
            verified_count: 0,
            average_confidence_score: None,
        }
    }

    #[test]
    fn rate_handles_empty_and_caps() {
        assert_eq!(attendance_rate(0, 0), 0.0);
        assert_eq!(attendance_rate(1, 3), 33.33);
        assert_eq!(attendance_rate(5, 4), 100.0);
    }

    #[test]
    fn statistics_by_method_and_status() {
        let records = vec![
            record(AttendanceMethod::FaceRecognition, AttendanceStatus::Present, true, Some(0.9)),
            record(AttendanceMethod::FaceRecognition, AttendanceStatus::Late, false, Some(0.7)),
            record(AttendanceMethod::QrCode, AttendanceStatus::Present, false, Some(1.0)),
            record(AttendanceMethod::QrCode, AttendanceStatus::Late, true, Some(1.0)),
        ];
        let stats = attendance_statistics(&records);
        assert_eq!(stats.total_attendance, 4);
        assert_eq!(stats.face_recognition_count, 2);
        assert_eq!(stats.qr_code_count, 2);
        assert_eq!(stats.late_count, 2);
        assert_eq!(stats.verification_rate, 50.0);
        assert_eq!(stats.average_confidence, Some(0.8));
    }

    #[test]
    fn daily_trends_group_by_day_and_class() {
        let day = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2025, 3, d)
                .unwrap()
                .and_hms_opt(h, 0, 0)
                .unwrap()
                .and_utc()
        };
        let mut records = Vec::new();
        for (user_id, class_id, at, status) in [
            (1, 1, day(3, 9), AttendanceStatus::Present),
            (2, 1, day(3, 9), AttendanceStatus::Late),
            (1, 2, day(3, 14), AttendanceStatus::Present),
            (1, 1, day(2, 9), AttendanceStatus::Present),
        ] {
            let mut r = record(AttendanceMethod::QrCode, status, false, Some(1.0));
            r.user_id = user_id;
            r.class_id = class_id;
            r.timestamp = at;
            records.push(r);
        }
        let capacity = HashMap::from([(1, 4)]);

        let points = daily_trends(&records, &capacity);
        let keys: Vec<_> = points.iter().map(|p| (p.date.to_string(), p.class_id)).collect();
        assert_eq!(
            keys,
            [
                ("2025-03-02".to_string(), 1),
                ("2025-03-03".to_string(), 1),
                ("2025-03-03".to_string(), 2),
            ]
        );

        let busy = &points[1];
        assert_eq!(busy.present_count, 2);
        assert_eq!(busy.absent_count, 2);
        assert_eq!(busy.late_count, 1);
        assert_eq!(busy.attendance_rate, 50.0);
        assert_eq!(busy.average_confidence_score, Some(1.0));

        // No capacity: distinct attendees stand in for the roster.
        assert_eq!(points[2].total_students, 1);
        assert_eq!(points[2].attendance_rate, 100.0);
    }

    #[test]
    fn direction_needs_history_beyond_a_week() {
        assert_eq!(trend_direction(&[]), TrendDirection::Stable);
        let week: Vec<_> = (0..7).map(|_| point(90.0)).collect();
        assert_eq!(trend_direction(&week), TrendDirection::Stable);
    }

    #[test]
    fn direction_compares_last_week_with_before() {
        let mut rising: Vec<_> = (0..3).map(|_| point(50.0)).collect();
        rising.extend((0..7).map(|_| point(80.0)));
        assert_eq!(trend_direction(&rising), TrendDirection::Improving);

        let mut falling: Vec<_> = (0..3).map(|_| point(80.0)).collect();
        falling.extend((0..7).map(|_| point(60.0)));
        assert_eq!(trend_direction(&falling), TrendDirection::Declining);

        let mut flat: Vec<_> = (0..3).map(|_| point(70.0)).collect();
        flat.extend((0..7).map(|_| point(74.0)));
        assert_eq!(trend_direction(&flat), TrendDirection::Stable);
    }

    #[test]
    fn summary_totals_points() {
        assert_eq!(trend_summary(&[]), None);
        let mut scored = point(40.0);
        scored.average_confidence_score = Some(0.9);
        let summary = trend_summary(&[point(80.0), scored]).unwrap();
        assert_eq!(summary.total_days, 2);
        assert_eq!(summary.average_attendance_rate, 60.0);
        assert_eq!(summary.total_present, 12);
        assert_eq!(summary.total_absent, 8);
        assert_eq!(summary.average_confidence_score, Some(0.9));
        assert_eq!(summary.trend_direction, TrendDirection::Stable);
    }
}
