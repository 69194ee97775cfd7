//! Capture-time resolution: picks one timestamp per asset from several
//! disagreeing sources and scores how much the sources agree.

use crate::config::DateConfig;
use crate::models::{Asset, RawTimestamp, ResolvedTime, Signal, TimestampCandidates};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::{debug, warn};

const TEXT_FORMATS: &[&str] = &[
    "%Y:%m:%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d_%H%M%S",
    "%Y%m%d%H%M%S",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y:%m:%d", "%Y-%m-%d"];

fn path_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?:^|\D)(",
            r"(?:19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])",
            r"|(?:19|20)\d{2}(?:[\-_](?:0?[1-9]|1[0-2])(?:[\-_](?:0?[1-9]|[12]\d|3[01]))?)?",
            r")(?:\D|$)"
        ))
        .expect("static regex")
    })
}

/// Parses a raw timestamp, returning `None` for anything unreadable.
pub fn parse_timestamp(raw: &RawTimestamp) -> Option<NaiveDateTime> {
    match raw {
        RawTimestamp::Epoch(secs) => DateTime::from_timestamp(*secs, 0).map(|d| d.naive_utc()),
        RawTimestamp::Fractional(secs) if secs.is_finite() => {
            DateTime::from_timestamp(secs.floor() as i64, 0).map(|d| d.naive_utc())
        }
        RawTimestamp::Text(text) => parse_text(text),
        RawTimestamp::Fractional(_) | RawTimestamp::Other(_) => {
            debug!(?raw, "unsupported timestamp value ignored");
            None
        }
    }
}

fn parse_text(text: &str) -> Option<NaiveDateTime> {
    let value = text.trim().trim_matches('\0');
    if value.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }
    for fmt in TEXT_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    debug!(value, "unparseable timestamp ignored");
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

/// A date recovered from a path component such as `2024-01-05` or `2019`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathDate {
    pub date: NaiveDate,
    pub precision: DatePrecision,
}

impl PathDate {
    /// True when `dt` falls inside the span the token names.
    pub fn matches(&self, dt: &NaiveDateTime) -> bool {
        let d = dt.date();
        match self.precision {
            DatePrecision::Year => d.year() == self.date.year(),
            DatePrecision::Month => d.year() == self.date.year() && d.month() == self.date.month(),
            DatePrecision::Day => d == self.date,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        self.date.and_hms_opt(0, 0, 0)
    }
}

/// Returns the first date token found in the path that names a real date.
/// Tokens must not touch other digits. A bare year only counts in a
/// directory name, since file names carry frame counters like `IMG_2034`.
pub fn path_date_token(path: &str) -> Option<PathDate> {
    let components: Vec<&str> = path.split(['/', '\\']).filter(|c| !c.is_empty()).collect();
    let last = components.len().saturating_sub(1);
    for (pos, component) in components.iter().enumerate() {
        // Resume at the token end so a shared delimiter can lead the next token.
        let mut start = 0;
        while let Some(token) = path_token_re()
            .captures_at(component, start)
            .and_then(|caps| caps.get(1))
        {
            start = token.end();
            match parse_path_token(token.as_str()) {
                Some(pd) if pd.precision == DatePrecision::Year && pos == last => {}
                Some(pd) => return Some(pd),
                None => {}
            }
        }
    }
    None
}

fn parse_path_token(token: &str) -> Option<PathDate> {
    if token.len() == 8 && token.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(token, "%Y%m%d")
            .ok()
            .map(|date| PathDate {
                date,
                precision: DatePrecision::Day,
            });
    }
    let parts: Vec<u32> = token
        .split(['-', '_'])
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;
    let year = i32::try_from(*parts.first()?).ok()?;
    match parts.len() {
        1 => NaiveDate::from_ymd_opt(year, 1, 1).map(|date| PathDate {
            date,
            precision: DatePrecision::Year,
        }),
        2 => NaiveDate::from_ymd_opt(year, parts[1], 1).map(|date| PathDate {
            date,
            precision: DatePrecision::Month,
        }),
        _ => NaiveDate::from_ymd_opt(year, parts[1], parts[2]).map(|date| PathDate {
            date,
            precision: DatePrecision::Day,
        }),
    }
}

/// Sane signals observed for a single asset, before any voting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub camera_original: Option<NaiveDateTime>,
    pub camera_modify: Option<NaiveDateTime>,
    pub filesystem: Option<NaiveDateTime>,
    pub path: Option<PathDate>,
}

impl Observation {
    pub fn from_candidates(candidates: &TimestampCandidates, path: &str, cfg: &DateConfig) -> Self {
        let sane = |dt: NaiveDateTime| {
            let year = dt.year();
            (cfg.sane_range[0]..=cfg.sane_range[1]).contains(&year)
        };
        let pick = |raw: &Option<RawTimestamp>| raw.as_ref().and_then(parse_timestamp).filter(|dt| sane(*dt));
        Self {
            camera_original: pick(&candidates.camera_original),
            camera_modify: pick(&candidates.camera_modify),
            filesystem: pick(&candidates.filesystem),
            path: path_date_token(path).filter(|pd| {
                (cfg.sane_range[0]..=cfg.sane_range[1]).contains(&pd.date.year())
            }),
        }
    }

    /// Time from the signals that do not depend on the camera's original
    /// clock. Folder medians are built from these so a drifted camera cannot
    /// vote for itself.
    fn independent_time(&self) -> Option<NaiveDateTime> {
        self.camera_modify
            .or(self.filesystem)
            .or_else(|| self.path.and_then(|p| p.as_datetime()))
    }
}

/// Resolves one asset given its raw candidates, its path and the median
/// capture time of its folder (if known).
pub fn resolve_one(
    candidates: &TimestampCandidates,
    path: &str,
    folder_median: Option<NaiveDateTime>,
    cfg: &DateConfig,
) -> ResolvedTime {
    let obs = Observation::from_candidates(candidates, path, cfg);
    resolve_observation(&obs, folder_median, cfg)
}

fn resolve_observation(
    obs: &Observation,
    folder_median: Option<NaiveDateTime>,
    cfg: &DateConfig,
) -> ResolvedTime {
    let weights = &cfg.weights;
    let mut discarded = Vec::new();

    let mut camera_original = obs.camera_original;
    if let (Some(original), Some(median)) = (camera_original, folder_median) {
        let drift = (original - median).num_days().abs();
        let confirmed = obs.path.map(|p| p.matches(&original)).unwrap_or(false);
        if drift > cfg.outlier_days && !confirmed {
            warn!(
                %original,
                %median,
                drift_days = drift,
                "camera original time deviates from folder median; discarding"
            );
            camera_original = None;
            discarded.push(Signal::CameraOriginal);
        }
    }

    let points: Vec<(Signal, NaiveDateTime)> = [
        (Signal::CameraOriginal, camera_original),
        (Signal::CameraModify, obs.camera_modify),
        (Signal::Filesystem, obs.filesystem),
    ]
    .into_iter()
    .filter_map(|(s, dt)| dt.map(|dt| (s, dt)))
    .collect();

    if points.is_empty() {
        return match obs.path.and_then(|p| p.as_datetime()) {
            Some(dt) => ResolvedTime {
                resolved_datetime: Some(dt),
                trust_score: weights.path_token.min(1.0),
                signals_used: vec![Signal::PathToken],
                discarded,
                date_uncertain: false,
            },
            None => ResolvedTime {
                discarded,
                ..ResolvedTime::unresolved()
            },
        };
    }

    // Vote on the calendar day. Points are in priority order so the first
    // strictly-better candidate wins ties.
    let mut best: Option<(usize, f32, NaiveDate)> = None;
    for (_, dt) in &points {
        let day = dt.date();
        let mut count = 0usize;
        let mut weight = 0.0f32;
        for (s, other) in &points {
            if other.date() == day {
                count += 1;
                weight += weights.weight(*s);
            }
        }
        if obs.path.map(|p| p.matches(dt)).unwrap_or(false) {
            count += 1;
            weight += weights.path_token;
        }
        let better = match best {
            None => true,
            Some((c, w, _)) => count > c || (count == c && weight > w),
        };
        if better {
            best = Some((count, weight, day));
        }
    }
    let Some((_, _, day)) = best else {
        return ResolvedTime::unresolved();
    };

    let agreeing: Vec<(Signal, NaiveDateTime)> = points
        .iter()
        .copied()
        .filter(|(_, dt)| dt.date() == day)
        .collect();

    let mut chosen = agreeing[0];
    for candidate in &agreeing[1..] {
        if weights.weight(candidate.0) > weights.weight(chosen.0) {
            chosen = *candidate;
        }
    }

    let mut signals_used: Vec<Signal> = agreeing.iter().map(|(s, _)| *s).collect();
    if obs.path.map(|p| p.matches(&chosen.1)).unwrap_or(false) {
        signals_used.push(Signal::PathToken);
    }
    let trust: f32 = signals_used.iter().map(|s| weights.weight(*s)).sum();

    ResolvedTime {
        resolved_datetime: Some(chosen.1),
        trust_score: trust.min(1.0),
        signals_used,
        discarded,
        date_uncertain: false,
    }
}

fn median(mut values: Vec<NaiveDateTime>) -> Option<NaiveDateTime> {
    values.sort();
    median_of_sorted(&values)
}

/// Even counts take the midpoint of the two middle values.
fn median_of_sorted(values: &[NaiveDateTime]) -> Option<NaiveDateTime> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let upper = values[n / 2];
    if n % 2 == 1 {
        return Some(upper);
    }
    let lower = values[n / 2 - 1];
    Some(lower + (upper - lower) / 2)
}

/// Per-member reference times for one folder. Independent signals are used
/// when any member has one. Otherwise each member is judged against the
/// camera times of its siblings, never its own.
fn folder_references(members: &[usize], observations: &[Observation]) -> Vec<Option<NaiveDateTime>> {
    let independent = median(
        members
            .iter()
            .filter_map(|&i| observations[i].independent_time())
            .collect(),
    );
    if independent.is_some() {
        return vec![independent; members.len()];
    }

    let mut camera: Vec<NaiveDateTime> = members
        .iter()
        .filter_map(|&i| observations[i].camera_original)
        .collect();
    // Two clocks that disagree give no majority to judge either by.
    if camera.len() < 3 {
        return vec![None; members.len()];
    }
    camera.sort();
    members
        .iter()
        .map(|&i| {
            let own = observations[i].camera_original?;
            let pos = camera.binary_search(&own).ok()?;
            let mut siblings = camera.clone();
            siblings.remove(pos);
            median_of_sorted(&siblings)
        })
        .collect()
}

/// Resolves every asset of a run. Folder medians and the sibling sequence
/// check need the whole set, so this is the entry point the pipeline uses.
pub fn resolve_all(assets: &[Asset], cfg: &DateConfig) -> Vec<ResolvedTime> {
    let observations: Vec<Observation> = assets
        .iter()
        .map(|a| Observation::from_candidates(&a.timestamps, &a.path, cfg))
        .collect();

    let mut by_folder: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (idx, asset) in assets.iter().enumerate() {
        by_folder.entry(asset.folder()).or_default().push(idx);
    }

    let mut resolved: Vec<ResolvedTime> = vec![ResolvedTime::unresolved(); assets.len()];
    for members in by_folder.values() {
        let references = folder_references(members, &observations);
        for (&i, reference) in members.iter().zip(references) {
            resolved[i] = resolve_observation(&observations[i], reference, cfg);
        }
    }

    apply_sequence_check(assets, &by_folder, &mut resolved, cfg);

    let ambiguous = resolved.iter().filter(|r| r.resolved_datetime.is_none()).count();
    if ambiguous > 0 {
        warn!(ambiguous, "assets without any sane timestamp signal");
    }
    resolved
}

/// Rewards assets whose time moves monotonically with their lexical position
/// among resolved siblings in the same folder.
fn apply_sequence_check(
    assets: &[Asset],
    by_folder: &BTreeMap<&str, Vec<usize>>,
    resolved: &mut [ResolvedTime],
    cfg: &DateConfig,
) {
    for members in by_folder.values() {
        let mut ordered: Vec<usize> = members
            .iter()
            .copied()
            .filter(|&i| resolved[i].resolved_datetime.is_some())
            .collect();
        if ordered.len() < 2 {
            continue;
        }
        ordered.sort_by(|&a, &b| {
            assets[a]
                .path
                .cmp(&assets[b].path)
                .then_with(|| assets[a].id.cmp(&assets[b].id))
        });
        let times: Vec<NaiveDateTime> = ordered
            .iter()
            .filter_map(|&i| resolved[i].resolved_datetime)
            .collect();
        for (pos, &idx) in ordered.iter().enumerate() {
            let t = times[pos];
            let after_prev = pos == 0 || times[pos - 1] <= t;
            let before_next = pos + 1 == times.len() || t <= times[pos + 1];
            if after_prev && before_next {
                let entry = &mut resolved[idx];
                entry.signals_used.push(Signal::Sequence);
                entry.trust_score = (entry.trust_score + cfg.weights.sequence).min(1.0);
            }
        }
    }
}
