//! Reference-table download and aggregation.
//!
//! Reference tables are CSV files keyed by administrative-unit id. Production
//! tables carry year-suffixed product columns (`soja_2023`); for each unit the
//! aggregator ranks products by the most recent year and keeps the top ten,
//! relabeling internal codes to display names. The indicator table is instead
//! transposed for display: indicators become rows, units become columns, and
//! several indicator names are rewritten to carry their measurement unit.

use std::collections::BTreeMap;
use std::time::Duration;

use csv::ReaderBuilder;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::municipalities::MunicipalityMatch;

/// Products kept per unit in ranked tables.
pub const TOP_PRODUCTS: usize = 10;

const DOWNLOAD_RETRIES: u32 = 3;

// ---------------------------------------------------------------------------
// Display-name lookups
// ---------------------------------------------------------------------------

/// Internal product codes and their display names. Codes missing here fall
/// back to the raw code.
const PRODUCT_LABELS: &[(&str, &str)] = &[
    ("algodao", "Algodão herbáceo (t)"),
    ("arroz", "Arroz (t)"),
    ("banana", "Banana (t)"),
    ("bovinos", "Bovinos (cabeças)"),
    ("cafe", "Café (t)"),
    ("cana", "Cana-de-açúcar (t)"),
    ("feijao", "Feijão (t)"),
    ("galinaceos", "Galináceos (cabeças)"),
    ("leite", "Leite (mil litros)"),
    ("mandioca", "Mandioca (t)"),
    ("milho", "Milho (t)"),
    ("ovos", "Ovos de galinha (mil dúzias)"),
    ("soja", "Soja (t)"),
    ("suinos", "Suínos (cabeças)"),
];

/// Indicator renames folding measurement units into the label.
const INDICATOR_LABELS: &[(&str, &str)] = &[
    ("area", "Área territorial (km²)"),
    ("populacao", "População residente (hab.)"),
    ("densidade", "Densidade demográfica (hab./km²)"),
    ("pib_per_capita", "PIB per capita (R$)"),
    ("idhm", "IDHM"),
];

pub fn product_label(code: &str) -> String {
    PRODUCT_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| code.to_string())
}

fn indicator_label(code: &str) -> String {
    INDICATOR_LABELS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| code.to_string())
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// How a reference table is restructured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// Year-columned production table, ranked per unit.
    Ranked,
    /// Indicator table transposed to indicator rows × unit columns.
    Indicators,
}

/// One fixed reference table.
#[derive(Debug, Clone)]
pub struct TableSource {
    pub name: String,
    pub url: String,
    pub unit_column: String,
    pub kind: TableKind,
}

impl TableSource {
    pub fn ranked(
        name: impl Into<String>,
        url: impl Into<String>,
        unit_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            unit_column: unit_column.into(),
            kind: TableKind::Ranked,
        }
    }

    pub fn indicators(
        name: impl Into<String>,
        url: impl Into<String>,
        unit_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            unit_column: unit_column.into(),
            kind: TableKind::Indicators,
        }
    }
}

/// The fixed sources used by the production deployment.
pub fn default_sources() -> Vec<TableSource> {
    const BASE: &str = "https://storage.googleapis.com/zap-referencias";
    vec![
        TableSource::ranked(
            "Produção Agrícola Municipal",
            format!("{BASE}/pam_producao.csv"),
            "cd_mun",
        ),
        TableSource::ranked(
            "Pecuária Municipal",
            format!("{BASE}/ppm_rebanhos.csv"),
            "cd_mun",
        ),
        TableSource::indicators(
            "Indicadores IBGE",
            format!("{BASE}/ibge_indicadores.csv"),
            "cd_mun",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One product line of a unit block: values per year, missing years blank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub code: String,
    pub label: String,
    pub values: Vec<(i32, Option<f64>)>,
}

/// One administrative unit's ranked block.
#[derive(Debug, Clone)]
pub struct UnitBlock {
    pub unit_id: String,
    pub unit_name: String,
    pub entries: Vec<RankedEntry>,
}

/// A ranked table across all selected units.
#[derive(Debug, Clone)]
pub struct RankedTable {
    pub name: String,
    pub years: Vec<i32>,
    pub units: Vec<UnitBlock>,
}

/// One indicator row of the transposed table, one value per unit.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub label: String,
    pub values: Vec<String>,
}

/// Transposed indicator table: rows are indicators, columns are units.
#[derive(Debug, Clone)]
pub struct IndicatorTable {
    pub name: String,
    pub unit_ids: Vec<String>,
    pub unit_names: Vec<String>,
    pub rows: Vec<IndicatorRow>,
}

/// Either restructured form, tagged by the source's [`TableKind`].
#[derive(Debug, Clone)]
pub enum TableResult {
    Ranked(RankedTable),
    Indicators(IndicatorTable),
}

impl TableResult {
    pub fn name(&self) -> &str {
        match self {
            Self::Ranked(t) => &t.name,
            Self::Indicators(t) => &t.name,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Downloads the fixed reference tables and restructures them per unit.
pub struct TabularAggregator {
    client: reqwest::Client,
    sources: Vec<TableSource>,
}

impl TabularAggregator {
    pub fn new(sources: Vec<TableSource>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Remote(e.into()))?;
        Ok(Self { client, sources })
    }

    pub fn with_default_sources() -> Result<Self> {
        Self::new(default_sources())
    }

    pub fn sources(&self) -> &[TableSource] {
        &self.sources
    }

    /// Download and restructure every source for the given units.
    pub async fn aggregate(&self, units: &[MunicipalityMatch]) -> Result<Vec<TableResult>> {
        let mut results = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let body = self.download(source).await?;
            let result = match source.kind {
                TableKind::Ranked => TableResult::Ranked(aggregate_ranked(source, &body, units)?),
                TableKind::Indicators => {
                    TableResult::Indicators(transpose_indicators(source, &body, units)?)
                }
            };
            info!(table = %source.name, "reference table aggregated");
            results.push(result);
        }
        Ok(results)
    }

    /// Fetch one table body, retrying transient failures with backoff.
    async fn download(&self, source: &TableSource) -> Result<String> {
        let mut last_reason = String::new();

        for attempt in 0..=DOWNLOAD_RETRIES {
            if attempt > 0 {
                let delay = Duration::from_millis(500 * (1 << (attempt - 1)));
                tokio::time::sleep(delay).await;
            }
            debug!(url = %source.url, attempt, "downloading reference table");

            match self.client.get(&source.url).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.text().await.map_err(|e| Error::TableDownload {
                        name: source.name.clone(),
                        reason: format!("reading body: {e}"),
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_client_error() {
                        return Err(Error::TableDownload {
                            name: source.name.clone(),
                            reason: format!("HTTP {status}"),
                        });
                    }
                    last_reason = format!("HTTP {status}");
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    warn!(url = %source.url, error = %e, "table download failed; retrying");
                    last_reason = e.to_string();
                }
                Err(e) => {
                    return Err(Error::TableDownload {
                        name: source.name.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        Err(Error::TableDownload {
            name: source.name.clone(),
            reason: last_reason,
        })
    }
}

// ---------------------------------------------------------------------------
// Restructuring
// ---------------------------------------------------------------------------

/// Split a `code_YYYY` header into its product code and year.
fn split_year_column(header: &str) -> Option<(&str, i32)> {
    let (code, year) = header.rsplit_once('_')?;
    let year: i32 = year.parse().ok()?;
    (1900..=2100).contains(&year).then_some((code, year))
}

fn aggregate_ranked(
    source: &TableSource,
    csv_text: &str,
    units: &[MunicipalityMatch],
) -> Result<RankedTable> {
    let parse_err = |reason: String| Error::TableParse {
        name: source.name.clone(),
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .clone();

    let unit_idx = headers
        .iter()
        .position(|h| h == source.unit_column)
        .ok_or_else(|| Error::MissingColumn {
            name: source.name.clone(),
            column: source.unit_column.clone(),
        })?;

    // (column index, product code, year)
    let mut columns: Vec<(usize, String, i32)> = Vec::new();
    for (i, header) in headers.iter().enumerate() {
        if i == unit_idx {
            continue;
        }
        if let Some((code, year)) = split_year_column(header) {
            columns.push((i, code.to_string(), year));
        }
    }

    let years: Vec<i32> = {
        let set: std::collections::BTreeSet<i32> = columns.iter().map(|(_, _, y)| *y).collect();
        set.into_iter().collect()
    };
    let latest = *years
        .last()
        .ok_or_else(|| parse_err("no year-suffixed columns".to_string()))?;

    // unit id → code → year → value
    let mut per_unit: BTreeMap<String, BTreeMap<String, BTreeMap<i32, f64>>> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_err(e.to_string()))?;
        let Some(unit) = record.get(unit_idx) else {
            continue;
        };
        if !units.iter().any(|m| m.id == unit) {
            continue;
        }
        let unit_values = per_unit.entry(unit.to_string()).or_default();
        for (i, code, year) in &columns {
            if let Some(value) = record.get(*i).and_then(|cell| cell.trim().parse().ok()) {
                unit_values
                    .entry(code.clone())
                    .or_default()
                    .insert(*year, value);
            }
        }
    }

    let mut blocks = Vec::new();
    for unit in units {
        let Some(unit_values) = per_unit.get(&unit.id) else {
            debug!(unit = %unit.id, table = %source.name, "unit absent from table");
            continue;
        };

        let mut entries: Vec<RankedEntry> = unit_values
            .iter()
            .map(|(code, by_year)| RankedEntry {
                code: code.clone(),
                label: product_label(code),
                values: years
                    .iter()
                    .map(|year| (*year, by_year.get(year).copied()))
                    .collect(),
            })
            .collect();

        // Rank by the most recent year, descending; products with no value
        // in that year sink to the bottom.
        entries.sort_by(|a, b| {
            let key = |e: &RankedEntry| {
                e.values
                    .iter()
                    .find(|(year, _)| *year == latest)
                    .and_then(|(_, v)| *v)
                    .unwrap_or(f64::NEG_INFINITY)
            };
            key(b).partial_cmp(&key(a)).unwrap_or(std::cmp::Ordering::Equal)
        });
        entries.truncate(TOP_PRODUCTS);

        blocks.push(UnitBlock {
            unit_id: unit.id.clone(),
            unit_name: unit.name.clone(),
            entries,
        });
    }

    Ok(RankedTable {
        name: source.name.clone(),
        years,
        units: blocks,
    })
}

fn transpose_indicators(
    source: &TableSource,
    csv_text: &str,
    units: &[MunicipalityMatch],
) -> Result<IndicatorTable> {
    let parse_err = |reason: String| Error::TableParse {
        name: source.name.clone(),
        reason,
    };

    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(csv_text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .clone();

    let unit_idx = headers
        .iter()
        .position(|h| h == source.unit_column)
        .ok_or_else(|| Error::MissingColumn {
            name: source.name.clone(),
            column: source.unit_column.clone(),
        })?;

    let indicator_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != unit_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    // unit id → raw record cells
    let mut per_unit: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| parse_err(e.to_string()))?;
        let Some(unit) = record.get(unit_idx) else {
            continue;
        };
        if !units.iter().any(|m| m.id == unit) {
            continue;
        }
        let cells = indicator_columns
            .iter()
            .map(|(i, _)| record.get(*i).unwrap_or_default().to_string())
            .collect();
        per_unit.insert(unit.to_string(), cells);
    }

    let rows = indicator_columns
        .iter()
        .enumerate()
        .map(|(row_idx, (_, header))| IndicatorRow {
            label: indicator_label(header),
            values: units
                .iter()
                .map(|unit| {
                    per_unit
                        .get(&unit.id)
                        .and_then(|cells| cells.get(row_idx).cloned())
                        .unwrap_or_default()
                })
                .collect(),
        })
        .collect();

    Ok(IndicatorTable {
        name: source.name.clone(),
        unit_ids: units.iter().map(|u| u.id.clone()).collect(),
        unit_names: units.iter().map(|u| u.name.clone()).collect(),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, name: &str) -> MunicipalityMatch {
        MunicipalityMatch {
            id: id.to_string(),
            name: name.to_string(),
            overlap_area: 1.0,
            representativeness: 50.0,
        }
    }

    fn ranked_source() -> TableSource {
        TableSource::ranked("Produção Agrícola Municipal", "http://unused", "cd_mun")
    }

    #[test]
    fn splits_year_columns() {
        assert_eq!(split_year_column("soja_2023"), Some(("soja", 2023)));
        assert_eq!(split_year_column("cana_de_acucar_2021"), Some(("cana_de_acucar", 2021)));
        assert_eq!(split_year_column("cd_mun"), None);
        assert_eq!(split_year_column("obs_9"), None);
    }

    #[test]
    fn ranks_by_latest_year_and_relabels() {
        let csv = "cd_mun,soja_2022,soja_2023,milho_2022,milho_2023,cafe_2022,cafe_2023\n\
                   100,10,50,20,80,5,1\n\
                   200,1,2,3,4,5,6\n";
        let table =
            aggregate_ranked(&ranked_source(), csv, &[unit("100", "Araxá")]).unwrap();

        assert_eq!(table.years, vec![2022, 2023]);
        assert_eq!(table.units.len(), 1);

        let block = &table.units[0];
        assert_eq!(block.unit_name, "Araxá");
        let codes: Vec<&str> = block.entries.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["milho", "soja", "cafe"]);
        assert_eq!(block.entries[0].label, "Milho (t)");
        assert_eq!(block.entries[0].values, vec![(2022, Some(20.0)), (2023, Some(80.0))]);
    }

    #[test]
    fn keeps_top_ten_only() {
        let mut header = String::from("cd_mun");
        let mut row = String::from("100");
        for i in 0..15 {
            header.push_str(&format!(",produto{i}_2023"));
            row.push_str(&format!(",{i}"));
        }
        let csv = format!("{header}\n{row}\n");
        let table =
            aggregate_ranked(&ranked_source(), &csv, &[unit("100", "Araxá")]).unwrap();
        assert_eq!(table.units[0].entries.len(), TOP_PRODUCTS);
        // Highest value first.
        assert_eq!(table.units[0].entries[0].code, "produto14");
    }

    #[test]
    fn filters_to_requested_units() {
        let csv = "cd_mun,soja_2023\n100,1\n200,2\n300,3\n";
        let table = aggregate_ranked(
            &ranked_source(),
            csv,
            &[unit("300", "Caeté"), unit("100", "Araxá")],
        )
        .unwrap();
        // Caller order preserved.
        let ids: Vec<&str> = table.units.iter().map(|b| b.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["300", "100"]);
    }

    #[test]
    fn missing_unit_column_is_reported() {
        let csv = "municipio,soja_2023\n100,1\n";
        let err =
            aggregate_ranked(&ranked_source(), csv, &[unit("100", "Araxá")]).unwrap_err();
        match err {
            Error::MissingColumn { column, .. } => assert_eq!(column, "cd_mun"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_year_cell_stays_blank() {
        let csv = "cd_mun,soja_2022,soja_2023\n100,,7\n";
        let table =
            aggregate_ranked(&ranked_source(), csv, &[unit("100", "Araxá")]).unwrap();
        assert_eq!(
            table.units[0].entries[0].values,
            vec![(2022, None), (2023, Some(7.0))]
        );
    }

    #[test]
    fn transposes_indicators_with_unit_labels() {
        let source = TableSource::indicators("Indicadores IBGE", "http://unused", "cd_mun");
        let csv = "cd_mun,area,populacao,idhm\n\
                   100,560.5,101000,0.73\n\
                   200,1200.0,35000,0.68\n";
        let table = transpose_indicators(
            &source,
            csv,
            &[unit("100", "Araxá"), unit("200", "Betim")],
        )
        .unwrap();

        assert_eq!(table.unit_names, vec!["Araxá", "Betim"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].label, "Área territorial (km²)");
        assert_eq!(table.rows[0].values, vec!["560.5", "1200.0"]);
        assert_eq!(table.rows[2].label, "IDHM");
        assert_eq!(table.rows[2].values, vec!["0.73", "0.68"]);
    }

    #[test]
    fn absent_unit_gets_blank_indicator_cells() {
        let source = TableSource::indicators("Indicadores IBGE", "http://unused", "cd_mun");
        let csv = "cd_mun,area\n100,560.5\n";
        let table = transpose_indicators(
            &source,
            csv,
            &[unit("100", "Araxá"), unit("999", "Fantasma")],
        )
        .unwrap();
        assert_eq!(table.rows[0].values, vec!["560.5", ""]);
    }

    #[test]
    fn default_sources_cover_three_tables() {
        let sources = default_sources();
        assert_eq!(sources.len(), 3);
        assert!(sources
            .iter()
            .any(|s| s.kind == TableKind::Indicators));
    }
}
