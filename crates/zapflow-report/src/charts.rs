//! Trend charts for ranked production tables.
//!
//! Each administrative unit gets one line chart per measurement unit (tons,
//! head counts, ...), so series with incompatible scales never share an
//! axis. Charts reference the already-written data cells by sheet name.

use rust_xlsxwriter::{Chart, ChartType, Workbook};
use tracing::debug;

use crate::error::Result;
use crate::workbook::UnitBlockRange;

/// Vertical cells reserved per inserted chart.
const CHART_ROW_STRIDE: u32 = 16;

/// Measurement unit embedded in a product label, e.g. `"Milho (t)"` → `t`.
pub fn measurement_unit(label: &str) -> Option<&str> {
    let open = label.rfind('(')?;
    let close = label.rfind(')')?;
    (close > open + 1).then(|| &label[open + 1..close])
}

/// Add one chart sheet for a ranked table's unit blocks.
pub(crate) fn add_trend_charts(
    workbook: &mut Workbook,
    table_index: usize,
    ranges: &[UnitBlockRange],
) -> Result<()> {
    if ranges.iter().all(|block| block.rows.is_empty()) {
        return Ok(());
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name(format!("Gráficos {}", table_index + 1))?;

    let mut cursor: u32 = 0;
    for block in ranges {
        for (group, rows) in group_by_measurement_unit(block) {
            let mut chart = Chart::new(ChartType::Line);
            let title = format!("{} - {}", block.unit_name, group);
            chart.title().set_name(title.as_str());

            let last_col = block.first_year_col + block.years - 1;
            for (row, label) in rows {
                chart
                    .add_series()
                    .set_values((
                        block.sheet.as_str(),
                        row,
                        block.first_year_col,
                        row,
                        last_col,
                    ))
                    .set_categories((
                        block.sheet.as_str(),
                        block.year_row,
                        block.first_year_col,
                        block.year_row,
                        last_col,
                    ))
                    .set_name(label.as_str());
            }

            sheet.insert_chart(cursor, 0, &chart)?;
            cursor += CHART_ROW_STRIDE;
        }
        debug!(unit = %block.unit_name, "trend charts written");
    }

    Ok(())
}

/// Group a block's rows by measurement unit, preserving first-seen order.
fn group_by_measurement_unit(block: &UnitBlockRange) -> Vec<(String, Vec<(u32, String)>)> {
    let mut groups: Vec<(String, Vec<(u32, String)>)> = Vec::new();
    for (row, label) in &block.rows {
        let unit = measurement_unit(label).unwrap_or("valores").to_string();
        match groups.iter_mut().find(|(name, _)| *name == unit) {
            Some((_, rows)) => rows.push((*row, label.clone())),
            None => groups.push((unit, vec![(*row, label.clone())])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_measurement_unit() {
        assert_eq!(measurement_unit("Milho (t)"), Some("t"));
        assert_eq!(measurement_unit("Leite (mil litros)"), Some("mil litros"));
        assert_eq!(measurement_unit("IDHM"), None);
        assert_eq!(measurement_unit("vazio ()"), None);
    }

    #[test]
    fn groups_preserve_first_seen_order() {
        let block = UnitBlockRange {
            sheet: "Produção".to_string(),
            unit_name: "Araxá".to_string(),
            year_row: 1,
            first_year_col: 1,
            years: 2,
            rows: vec![
                (2, "Milho (t)".to_string()),
                (3, "Bovinos (cabeças)".to_string()),
                (4, "Soja (t)".to_string()),
            ],
        };
        let groups = group_by_measurement_unit(&block);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "t");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "cabeças");
    }

    #[test]
    fn chart_sheet_written_for_non_empty_blocks() {
        let mut workbook = Workbook::new();
        let data = workbook.add_worksheet();
        data.set_name("Produção").unwrap();
        data.write_number(1, 1, 2022.0).unwrap();
        data.write_number(1, 2, 2023.0).unwrap();
        data.write_number(2, 1, 10.0).unwrap();
        data.write_number(2, 2, 20.0).unwrap();

        let block = UnitBlockRange {
            sheet: "Produção".to_string(),
            unit_name: "Araxá".to_string(),
            year_row: 1,
            first_year_col: 1,
            years: 2,
            rows: vec![(2, "Milho (t)".to_string())],
        };
        add_trend_charts(&mut workbook, 0, &[block]).unwrap();
        let bytes = workbook.save_to_buffer().unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
