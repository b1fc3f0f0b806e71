use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{CertificateId, CourseId, Percent, UserId};

/// Server decision on whether the viewer may claim a certificate.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CertificateEligibility {
    pub eligible: bool,
    #[serde(default)]
    pub completion: Option<Percent>,
}

/// An issued course certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: CertificateId,
    #[serde(default)]
    pub student_id: Option<UserId>,
    #[serde(default)]
    pub student_name: Option<String>,
    pub course_id: CourseId,
    pub course_title: String,
    /// Issue timestamp as sent by the backend; see [`Certificate::issued_at`].
    #[serde(default)]
    pub issued_date: Option<String>,
    pub certificate_number: String,
    #[serde(default)]
    pub certificate_url: Option<String>,
    #[serde(default)]
    pub completion_percentage: Option<Percent>,
}

impl Certificate {
    /// Parsed issue timestamp.
    ///
    /// Accepts RFC 3339, zone-less ISO timestamps (with or without fractional
    /// seconds) and bare dates. Returns `None` for anything else.
    #[must_use]
    pub fn issued_at(&self) -> Option<NaiveDateTime> {
        let raw = self.issued_date.as_deref()?.trim();
        if let Ok(with_zone) = DateTime::parse_from_rfc3339(raw) {
            return Some(with_zone.naive_utc());
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive);
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    }
}

/// Keep one certificate per course: the one with the latest issue date.
///
/// A later entry only replaces an earlier one when both dates parse and the
/// later one is strictly newer. Output keeps the order in which each course
/// was first seen.
#[must_use]
pub fn latest_per_course(certificates: Vec<Certificate>) -> Vec<Certificate> {
    let mut slots: HashMap<CourseId, usize> = HashMap::new();
    let mut kept: Vec<Certificate> = Vec::with_capacity(certificates.len());

    for cert in certificates {
        match slots.get(&cert.course_id) {
            None => {
                slots.insert(cert.course_id, kept.len());
                kept.push(cert);
            }
            Some(&slot) => {
                let newer = match (cert.issued_at(), kept[slot].issued_at()) {
                    (Some(candidate), Some(existing)) => candidate > existing,
                    _ => false,
                };
                if newer {
                    kept[slot] = cert;
                }
            }
        }
    }

    kept
}

/// Whether any certificate was issued for a course with exactly this title.
///
/// Matching is by title, not course id: two courses sharing a title are
/// indistinguishable here, and differently cased titles never match.
#[must_use]
pub fn has_certificate_titled(certificates: &[Certificate], course_title: &str) -> bool {
    certificates
        .iter()
        .any(|cert| cert.course_title == course_title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert(id: u64, course: u64, title: &str, issued: Option<&str>) -> Certificate {
        Certificate {
            id: CertificateId::new(id),
            student_id: Some(UserId::new(1)),
            student_name: None,
            course_id: CourseId::new(course),
            course_title: title.to_owned(),
            issued_date: issued.map(str::to_owned),
            certificate_number: format!("CERT-{id}"),
            certificate_url: None,
            completion_percentage: None,
        }
    }

    #[test]
    fn keeps_latest_certificate_per_course() {
        let list = vec![
            cert(1, 10, "Rust", Some("2024-01-01T10:00:00")),
            cert(2, 20, "Go", Some("2024-02-01T10:00:00")),
            cert(3, 10, "Rust", Some("2024-03-01T10:00:00.123")),
            cert(4, 10, "Rust", Some("2023-12-01T10:00:00")),
        ];
        let kept = latest_per_course(list);
        let ids: Vec<u64> = kept.iter().map(|c| c.id.value()).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn undated_duplicates_keep_the_first_seen() {
        let list = vec![
            cert(1, 10, "Rust", Some("2024-01-01T10:00:00")),
            cert(2, 10, "Rust", None),
        ];
        let kept = latest_per_course(list);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, CertificateId::new(1));
    }

    #[test]
    fn title_match_is_exact() {
        let list = vec![cert(1, 10, "Intro to Rust", None)];
        assert!(has_certificate_titled(&list, "Intro to Rust"));
        assert!(!has_certificate_titled(&list, "intro to rust"));
    }

    #[test]
    fn issued_at_accepts_zoned_timestamps() {
        let c = cert(1, 1, "x", Some("2024-01-01T10:00:00Z"));
        assert!(c.issued_at().is_some());
        let d = cert(1, 1, "x", Some("yesterday"));
        assert!(d.issued_at().is_none());
    }
}
