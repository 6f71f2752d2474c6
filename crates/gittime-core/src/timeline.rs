//! Version timeline: a feature's evolution grouped by release.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CommitId, CommitMeta, EvolutionEntry, FeatureEvolution, Release, Tag, VersionEntry};

/// A release or tag with the date it shipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePoint {
    pub label: String,
    pub date: DateTime<Utc>,
}

/// Release points, oldest first.
///
/// Published releases win. Without any, tags whose commit is in `commits`
/// are used, dated by that commit. Tags pointing outside the window and
/// unpublished releases are skipped.
pub fn release_points(releases: &[Release], tags: &[Tag], commits: &[CommitMeta]) -> Vec<ReleasePoint> {
    let mut points: Vec<ReleasePoint> = releases
        .iter()
        .filter_map(|r| {
            r.published_at.map(|date| ReleasePoint {
                label: r.tag_name.clone(),
                date,
            })
        })
        .collect();

    if points.is_empty() {
        let dates: HashMap<&CommitId, DateTime<Utc>> =
            commits.iter().map(|c| (&c.id, c.timestamp)).collect();
        points = tags
            .iter()
            .filter_map(|t| {
                dates.get(&t.commit).map(|&date| ReleasePoint {
                    label: t.name.clone(),
                    date,
                })
            })
            .collect();
    }

    points.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.label.cmp(&b.label)));
    points
}

/// Group evolution entries under the first release point at or after them.
///
/// Entries newer than every point become their own version, labelled by
/// short SHA. Points without entries are left out.
pub fn version_timeline(evolution: &FeatureEvolution, points: &[ReleasePoint]) -> Vec<VersionEntry> {
    let mut grouped: BTreeMap<usize, Vec<&EvolutionEntry>> = BTreeMap::new();
    let mut unreleased = Vec::new();

    for entry in &evolution.entries {
        match points.iter().position(|p| p.date >= entry.commit.timestamp) {
            Some(idx) => grouped.entry(idx).or_default().push(entry),
            None => unreleased.push(entry),
        }
    }

    let mut versions: Vec<VersionEntry> = grouped
        .into_iter()
        .map(|(idx, entries)| {
            let point = &points[idx];
            VersionEntry {
                version: point.label.clone(),
                date: point.date.format("%Y-%m-%d").to_string(),
                description: describe(&entries),
                commits: entries.iter().map(|e| e.commit.id.clone()).collect(),
            }
        })
        .collect();

    versions.extend(unreleased.into_iter().map(|entry| VersionEntry {
        version: entry.short_id().to_string(),
        date: entry.date(),
        description: describe(&[entry]),
        commits: vec![entry.commit.id.clone()],
    }));

    versions
}

/// Narratives of the entries; headlines stand in when every narrative is
/// degraded.
fn describe(entries: &[&EvolutionEntry]) -> String {
    let narratives: Vec<&str> = entries
        .iter()
        .filter(|e| !e.degraded)
        .map(|e| e.narrative.as_str())
        .collect();

    if narratives.is_empty() {
        entries
            .iter()
            .map(|e| e.commit.headline())
            .collect::<Vec<_>>()
            .join("; ")
    } else {
        narratives.join(" ")
    }
}
