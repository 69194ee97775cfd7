//! Splits resolved assets into contiguous time windows so clustering never
//! merges shoots separated by long gaps.

use crate::models::{Asset, ResolvedTime, TimeWindow};
use chrono::Duration;
use tracing::debug;

/// Partitions assets by resolved time. Assets without a resolved time are
/// pinned to the end, one singleton window each.
pub fn partition(assets: &[Asset], resolved: &[ResolvedTime], gap: Duration) -> Vec<TimeWindow> {
    let mut timed: Vec<usize> = Vec::new();
    let mut untimed: Vec<usize> = Vec::new();
    for (idx, r) in resolved.iter().enumerate() {
        if r.resolved_datetime.is_some() {
            timed.push(idx);
        } else {
            untimed.push(idx);
        }
    }

    timed.sort_by(|&a, &b| {
        resolved[a]
            .resolved_datetime
            .cmp(&resolved[b].resolved_datetime)
            .then_with(|| assets[a].id.cmp(&assets[b].id))
    });
    untimed.sort_by(|&a, &b| assets[a].id.cmp(&assets[b].id));

    let mut windows: Vec<TimeWindow> = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut last = None;
    for idx in timed {
        let Some(t) = resolved[idx].resolved_datetime else {
            continue;
        };
        if let Some(prev) = last {
            if t - prev > gap && !current.is_empty() {
                push_window(&mut windows, std::mem::take(&mut current), resolved);
            }
        }
        current.push(idx);
        last = Some(t);
    }
    if !current.is_empty() {
        push_window(&mut windows, current, resolved);
    }

    for idx in untimed {
        push_window(&mut windows, vec![idx], resolved);
    }

    debug!(windows = windows.len(), "partitioned assets into time windows");
    windows
}

fn push_window(windows: &mut Vec<TimeWindow>, members: Vec<usize>, resolved: &[ResolvedTime]) {
    let start = members.first().and_then(|&i| resolved[i].resolved_datetime);
    let end = members.last().and_then(|&i| resolved[i].resolved_datetime);
    windows.push(TimeWindow {
        index: windows.len(),
        members,
        start,
        end,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Signal, TimestampCandidates};
    use chrono::NaiveDateTime;

    fn asset(id: &str) -> Asset {
        Asset {
            id: id.to_string(),
            path: format!("f/{id}.jpg"),
            timestamps: TimestampCandidates::default(),
            tags: Vec::new(),
            embedding: vec![1.0, 0.0],
        }
    }

    fn at(s: Option<&str>) -> ResolvedTime {
        match s {
            Some(s) => ResolvedTime {
                resolved_datetime: Some(
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap(),
                ),
                trust_score: 0.1,
                signals_used: vec![Signal::Filesystem],
                discarded: Vec::new(),
                date_uncertain: false,
            },
            None => ResolvedTime::unresolved(),
        }
    }

    #[test]
    fn gap_larger_than_limit_starts_new_window() {
        let assets: Vec<Asset> = ["a", "b", "c", "d"].iter().map(|s| asset(s)).collect();
        let resolved = vec![
            at(Some("2024-01-01 10:00")),
            at(Some("2024-01-01 10:59")),
            at(Some("2024-01-01 12:00")),
            at(Some("2024-01-01 13:00")),
        ];
        let windows = partition(&assets, &resolved, Duration::minutes(60));
        let members: Vec<Vec<usize>> = windows.iter().map(|w| w.members.clone()).collect();
        // 10:59 -> 12:00 is 61 minutes; 12:00 -> 13:00 is exactly the limit.
        assert_eq!(members, vec![vec![0, 1], vec![2, 3]]);
    }

    #[test]
    fn untimed_assets_become_trailing_singletons() {
        let assets: Vec<Asset> = ["z", "y", "x"].iter().map(|s| asset(s)).collect();
        let resolved = vec![None, Some("2024-01-01 10:00"), None]
            .into_iter()
            .map(at)
            .collect::<Vec<_>>();
        let windows = partition(&assets, &resolved, Duration::minutes(60));
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].members, vec![1]);
        // Remaining singletons in id order: "x" (2) then "z" (0).
        assert_eq!(windows[1].members, vec![2]);
        assert_eq!(windows[2].members, vec![0]);
        assert!(windows[2].start.is_none());
        assert_eq!(windows.iter().map(|w| w.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn equal_timestamps_share_a_window_in_id_order() {
        let assets: Vec<Asset> = ["b", "a"].iter().map(|s| asset(s)).collect();
        let resolved = vec![at(Some("2024-01-01 10:00")), at(Some("2024-01-01 10:00"))];
        let windows = partition(&assets, &resolved, Duration::minutes(1));
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].members, vec![1, 0]);
    }

    #[test]
    fn every_asset_lands_in_exactly_one_window() {
        let assets: Vec<Asset> = (0..40).map(|i| asset(&format!("id{i:02}"))).collect();
        let resolved: Vec<ResolvedTime> = (0..40)
            .map(|i| {
                if i % 7 == 0 {
                    at(None)
                } else {
                    let minutes = (i * 37) % 600;
                    at(Some(&format!(
                        "2024-01-01 {:02}:{:02}",
                        minutes / 60,
                        minutes % 60
                    )))
                }
            })
            .collect();
        let windows = partition(&assets, &resolved, Duration::minutes(20));
        let mut seen: Vec<usize> = windows.iter().flat_map(|w| w.members.clone()).collect();
        seen.sort();
        assert_eq!(seen, (0..40).collect::<Vec<_>>());

        let timed: Vec<&TimeWindow> = windows.iter().filter(|w| w.start.is_some()).collect();
        for pair in timed.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }
}
