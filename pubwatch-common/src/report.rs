//! Plain-text tables for operators.

use crate::spec::{ArtifactSpec, PackageSpec, SnapSpec};
use std::fmt::Write as _;

const SEPARATOR: &str = " | ";

/// Left-aligned table with a dashed rule under the header and at the end.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let rule_len = widths.iter().sum::<usize>() + SEPARATOR.len() * widths.len().saturating_sub(1);
    let rule = "-".repeat(rule_len);

    let mut out = String::new();
    let header_cells: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
    push_row(&mut out, &widths, &header_cells);
    out.push_str(&rule);
    out.push('\n');
    for row in rows {
        push_row(&mut out, &widths, row);
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

fn push_row(out: &mut String, widths: &[usize], cells: &[String]) {
    let line = widths
        .iter()
        .zip(cells)
        .map(|(width, cell)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(SEPARATOR);
    out.push_str(line.trim_end());
    out.push('\n');
}

pub fn snap_table(specs: &[&SnapSpec]) -> String {
    let rows: Vec<Vec<String>> = specs
        .iter()
        .map(|s| vec![s.name.clone(), s.channel.to_string(), s.architecture.clone()])
        .collect();
    render_table(&["name", "channel", "arch"], &rows)
}

pub fn package_table(specs: &[&PackageSpec]) -> String {
    let rows: Vec<Vec<String>> = specs
        .iter()
        .map(|p| {
            vec![
                p.package.clone(),
                p.ppa.clone(),
                p.ubuntu_version.clone(),
                p.architecture.clone(),
            ]
        })
        .collect();
    render_table(&["name", "ppa", "ubuntu version", "arch"], &rows)
}

/// Per-kind summary of what is still missing after a round.
pub fn unmet_report(unmet: &[ArtifactSpec]) -> String {
    let snaps: Vec<&SnapSpec> = unmet.iter().filter_map(ArtifactSpec::as_snap).collect();
    let packages: Vec<&PackageSpec> = unmet.iter().filter_map(ArtifactSpec::as_package).collect();

    let mut out = String::new();
    if !snaps.is_empty() {
        let _ = writeln!(out, "{} snap(s) not yet available in the store:", snaps.len());
        out.push_str(&snap_table(&snaps));
    }
    if !packages.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "{} package(s) not yet available in the PPA:", packages.len());
        out.push_str(&package_table(&packages));
    }
    out
}

/// Every spec of a matrix, one row each.
pub fn matrix_table(specs: &[ArtifactSpec]) -> String {
    let rows: Vec<Vec<String>> = specs
        .iter()
        .map(|spec| match spec {
            ArtifactSpec::Snap(s) => vec![
                "snap".to_string(),
                s.name.clone(),
                s.version.clone(),
                s.channel.to_string(),
                String::new(),
                s.architecture.clone(),
            ],
            ArtifactSpec::Package(p) => vec![
                "package".to_string(),
                p.package.clone(),
                p.version.clone(),
                p.ppa.clone(),
                p.ubuntu_version.clone(),
                p.architecture.clone(),
            ],
        })
        .collect();
    render_table(
        &["kind", "name", "version", "channel", "ubuntu", "arch"],
        &rows,
    )
}
