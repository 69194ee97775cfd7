//! Flattens enriched clusters into the order-stable report consumed by
//! review tooling.

use crate::models::{Asset, Cluster, ClusterReport, ClusterRow};
use std::io::{self, Write};

pub const CSV_HEADER: [&str; 7] = [
    "folder",
    "cluster_type",
    "cluster_tag",
    "label_hint",
    "cluster_size",
    "medoid_rel_path",
    "cosine_to_centroid",
];

/// Deepest folder containing every member of the cluster.
pub fn common_folder<'a>(folders: impl IntoIterator<Item = &'a str>) -> String {
    let mut prefix: Option<Vec<&str>> = None;
    for folder in folders {
        let parts: Vec<&str> = folder.split('/').filter(|p| !p.is_empty()).collect();
        prefix = Some(match prefix {
            None => parts,
            Some(current) => current
                .into_iter()
                .zip(parts)
                .take_while(|(a, b)| a == b)
                .map(|(a, _)| a)
                .collect(),
        });
    }
    prefix.map(|p| p.join("/")).unwrap_or_default()
}

/// Builds report rows. `clusters` must be in discovery order (window, then
/// emission order); rows are then stably sorted by folder and cluster type so
/// that discovery order breaks the remaining ties.
pub fn assemble(clusters: &[Cluster], assets: &[Asset]) -> ClusterReport {
    let mut rows: Vec<ClusterRow> = clusters
        .iter()
        .map(|c| {
            let medoid = &assets[c.medoid];
            ClusterRow {
                folder: common_folder(c.members.iter().map(|&i| assets[i].folder())),
                cluster_type: c.cluster_type,
                cluster_tag: c.cluster_tag.clone().unwrap_or_default(),
                label_hint: c
                    .label_hint
                    .clone()
                    .or_else(|| c.cluster_tag.clone())
                    .unwrap_or_default(),
                cluster_size: c.size,
                medoid_id: medoid.id.clone(),
                medoid_rel_path: medoid.path.clone(),
                cosine_to_centroid: c.cosine_to_centroid,
                window: c.window,
                member_ids: c.members.iter().map(|&i| assets[i].id.clone()).collect(),
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        a.folder
            .cmp(&b.folder)
            .then_with(|| a.cluster_type.cmp(&b.cluster_type))
    });
    ClusterReport { rows }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes the report in the seven-column CSV layout, header first.
pub fn write_csv<W: Write>(report: &ClusterReport, mut out: W) -> io::Result<()> {
    writeln!(out, "{}", CSV_HEADER.join(","))?;
    for row in &report.rows {
        let size = row.cluster_size.to_string();
        let cosine = format!("{:.6}", row.cosine_to_centroid);
        let fields = [
            row.folder.as_str(),
            row.cluster_type.as_str(),
            row.cluster_tag.as_str(),
            row.label_hint.as_str(),
            size.as_str(),
            row.medoid_rel_path.as_str(),
            cosine.as_str(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    out.flush()
}
