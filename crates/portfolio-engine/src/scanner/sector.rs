//! Sector Aggregation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::SymbolSnapshot;
use super::signals::Signal;
use crate::config::ScannerConfig;

/// Mean metrics of the scanned symbols in one sector
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectorSummary {
    pub sector: String,
    pub symbol_count: usize,
    pub mean_volatility: f64,
    pub mean_momentum: f64,
    pub mean_volume_ratio: f64,
    pub signal: Signal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    HighVolatility,
    BullishMomentum,
    BearishMomentum,
    UnusualVolume,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorInsight {
    pub kind: InsightKind,
    pub sectors: Vec<String>,
    pub description: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SectorAnalysis {
    /// Ordered by mean volatility desc, then sector name
    pub sectors: Vec<SectorSummary>,
    pub insights: Vec<SectorInsight>,
}

const INSIGHT_SECTOR_LIMIT: usize = 3;

pub fn analyze_sectors(snapshots: &[SymbolSnapshot], config: &ScannerConfig) -> SectorAnalysis {
    let mut groups: BTreeMap<&str, Vec<&SymbolSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        groups.entry(snapshot.sector.as_str()).or_default().push(snapshot);
    }

    let mut sectors: Vec<SectorSummary> = groups
        .into_iter()
        .map(|(sector, members)| {
            #[allow(clippy::cast_precision_loss)]
            let n = members.len() as f64;
            let mean = |f: fn(&SymbolSnapshot) -> f64| members.iter().map(|s| f(s)).sum::<f64>() / n;
            let mean_momentum = mean(|s| s.momentum);
            SectorSummary {
                sector: sector.to_string(),
                symbol_count: members.len(),
                mean_volatility: mean(|s| s.volatility),
                mean_momentum,
                mean_volume_ratio: mean(|s| s.volume_ratio),
                signal: Signal::for_sector(mean_momentum, config),
            }
        })
        .collect();

    sectors.sort_by(|a, b| {
        b.mean_volatility
            .total_cmp(&a.mean_volatility)
            .then_with(|| a.sector.cmp(&b.sector))
    });

    let insights = sector_insights(&sectors, config);
    SectorAnalysis { sectors, insights }
}

fn sector_insights(sectors: &[SectorSummary], config: &ScannerConfig) -> Vec<SectorInsight> {
    let pick = |pred: &dyn Fn(&SectorSummary) -> bool| -> Vec<String> {
        sectors
            .iter()
            .filter(|s| pred(s))
            .take(INSIGHT_SECTOR_LIMIT)
            .map(|s| s.sector.clone())
            .collect()
    };

    let candidates = [
        (
            InsightKind::HighVolatility,
            pick(&|s: &SectorSummary| s.mean_volatility > config.sector_high_volatility),
            "High volatility detected in {}, suggesting potential trading opportunities",
        ),
        (
            InsightKind::BullishMomentum,
            pick(&|s: &SectorSummary| s.mean_momentum > config.momentum_signal),
            "Positive momentum in {}, indicating potential upward trends",
        ),
        (
            InsightKind::BearishMomentum,
            pick(&|s: &SectorSummary| s.mean_momentum < -config.momentum_signal),
            "Negative momentum in {}, suggesting caution or hedging",
        ),
        (
            InsightKind::UnusualVolume,
            pick(&|s: &SectorSummary| s.mean_volume_ratio > config.unusual_volume),
            "Unusual trading volume in {}, indicating increased market interest",
        ),
    ];

    candidates
        .into_iter()
        .filter(|(_, names, _)| !names.is_empty())
        .map(|(kind, sectors, template)| SectorInsight {
            kind,
            description: template.replace("{}", &sectors.join(", ")),
            sectors,
        })
        .collect()
}
