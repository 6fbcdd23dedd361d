//! Executive summary: the handful of headline metrics with their status.

use serde::Serialize;

use crate::classify::{
    Status, cache_hit_status, connections_status, cpu_status, ram_status, slow_queries_status,
};
use crate::model::ReportModel;

/// One line of the executive summary.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SummaryRow {
    pub metric: &'static str,
    pub value: String,
    pub status: Status,
}

/// Headline metrics in display order.
pub fn summarize(model: &ReportModel) -> Vec<SummaryRow> {
    let host = &model.resource_usage.host;
    let server = &model.resource_usage.server;
    let cache_pct = model.cache_hit.total.ratio_pct();
    let slow = model.long_queries.len();

    vec![
        SummaryRow {
            metric: "System CPU Usage",
            value: format!("{:.1}%", host.cpu_pct),
            status: cpu_status(host.cpu_pct),
        },
        SummaryRow {
            metric: "System RAM Usage",
            value: format!("{:.1}%", host.ram_pct),
            status: ram_status(host.ram_pct),
        },
        SummaryRow {
            metric: "PostgreSQL Connections",
            value: server.active_connections.to_string(),
            status: connections_status(server.active_connections),
        },
        SummaryRow {
            metric: "Cache Hit Ratio",
            value: format!("{:.2}%", cache_pct),
            status: cache_hit_status(cache_pct),
        },
        SummaryRow {
            metric: "Slow Queries",
            value: slow.to_string(),
            status: slow_queries_status(slow),
        },
    ]
}
