//! Workbook assembly from aggregated reference tables.
//!
//! One sheet per source table. Within a ranked sheet each administrative
//! unit gets a merged bold header row, a bold year header row, its
//! top-product rows, and a blank separator row before the next unit. The
//! indicator table is written as-is (indicators down, units across). Trend
//! charts for the ranked tables land on dedicated chart sheets at the end.

use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use crate::charts;
use crate::error::Result;
use zapflow_pipeline::tables::{IndicatorTable, RankedTable, TableResult};

/// Excel's hard sheet-name limit.
pub const SHEET_NAME_LIMIT: usize = 31;

/// Truncate a table name to a legal sheet name.
pub fn sheet_name(name: &str) -> String {
    name.chars().take(SHEET_NAME_LIMIT).collect()
}

/// Cell ranges of one unit block, recorded for chart series.
#[derive(Debug, Clone)]
pub struct UnitBlockRange {
    pub sheet: String,
    pub unit_name: String,
    pub year_row: u32,
    pub first_year_col: u16,
    pub years: u16,
    /// `(row, label)` of each product line in the block.
    pub rows: Vec<(u32, String)>,
}

/// Assemble the workbook and return its bytes for download or export.
pub fn build_workbook(tables: &[TableResult]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let mut chart_blocks: Vec<Vec<UnitBlockRange>> = Vec::new();
    for table in tables {
        match table {
            TableResult::Ranked(table) => {
                let ranges = write_ranked_sheet(&mut workbook, table, &bold)?;
                chart_blocks.push(ranges);
            }
            TableResult::Indicators(table) => {
                write_indicator_sheet(&mut workbook, table, &bold)?;
            }
        }
    }

    for (index, ranges) in chart_blocks.iter().enumerate() {
        charts::add_trend_charts(&mut workbook, index, ranges)?;
    }

    Ok(workbook.save_to_buffer()?)
}

fn write_ranked_sheet(
    workbook: &mut Workbook,
    table: &RankedTable,
    bold: &Format,
) -> Result<Vec<UnitBlockRange>> {
    let name = sheet_name(&table.name);
    let sheet = workbook.add_worksheet();
    sheet.set_name(&name)?;
    debug!(sheet = %name, units = table.units.len(), "writing ranked sheet");

    let mut ranges = Vec::with_capacity(table.units.len());
    let mut row: u32 = 0;
    let last_col = table.years.len() as u16;

    for unit in &table.units {
        // Merged unit header across the label and year columns.
        sheet.merge_range(row, 0, row, last_col, &unit.unit_name, bold)?;
        row += 1;

        let year_row = row;
        sheet.write_string_with_format(row, 0, "Produto", bold)?;
        for (j, year) in table.years.iter().enumerate() {
            sheet.write_number_with_format(row, 1 + j as u16, *year as f64, bold)?;
        }
        row += 1;

        let mut rows = Vec::with_capacity(unit.entries.len());
        for entry in &unit.entries {
            sheet.write_string(row, 0, &entry.label)?;
            for (j, (_, value)) in entry.values.iter().enumerate() {
                if let Some(value) = value {
                    sheet.write_number(row, 1 + j as u16, *value)?;
                }
            }
            rows.push((row, entry.label.clone()));
            row += 1;
        }

        ranges.push(UnitBlockRange {
            sheet: name.clone(),
            unit_name: unit.unit_name.clone(),
            year_row,
            first_year_col: 1,
            years: table.years.len() as u16,
            rows,
        });

        // Blank separator before the next unit block.
        row += 1;
    }

    Ok(ranges)
}

fn write_indicator_sheet(
    workbook: &mut Workbook,
    table: &IndicatorTable,
    bold: &Format,
) -> Result<()> {
    let name = sheet_name(&table.name);
    let sheet = workbook.add_worksheet();
    sheet.set_name(&name)?;
    debug!(sheet = %name, rows = table.rows.len(), "writing indicator sheet");

    sheet.write_string_with_format(0, 0, "Indicador", bold)?;
    for (j, unit_name) in table.unit_names.iter().enumerate() {
        sheet.write_string_with_format(0, 1 + j as u16, unit_name, bold)?;
    }

    for (i, indicator) in table.rows.iter().enumerate() {
        let row = 1 + i as u32;
        sheet.write_string(row, 0, &indicator.label)?;
        for (j, value) in indicator.values.iter().enumerate() {
            let col = 1 + j as u16;
            // Numeric cells stay numeric so the sheet remains sortable.
            match value.trim().parse::<f64>() {
                Ok(number) => sheet.write_number(row, col, number)?,
                Err(_) => sheet.write_string(row, col, value)?,
            };
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zapflow_pipeline::tables::{IndicatorRow, RankedEntry, UnitBlock};

    fn ranked_table() -> RankedTable {
        RankedTable {
            name: "Produção Agrícola Municipal".to_string(),
            years: vec![2022, 2023],
            units: vec![UnitBlock {
                unit_id: "100".to_string(),
                unit_name: "Araxá".to_string(),
                entries: vec![
                    RankedEntry {
                        code: "milho".to_string(),
                        label: "Milho (t)".to_string(),
                        values: vec![(2022, Some(20.0)), (2023, Some(80.0))],
                    },
                    RankedEntry {
                        code: "soja".to_string(),
                        label: "Soja (t)".to_string(),
                        values: vec![(2022, Some(10.0)), (2023, None)],
                    },
                ],
            }],
        }
    }

    fn indicator_table() -> IndicatorTable {
        IndicatorTable {
            name: "Indicadores IBGE".to_string(),
            unit_ids: vec!["100".to_string()],
            unit_names: vec!["Araxá".to_string()],
            rows: vec![
                IndicatorRow {
                    label: "Área territorial (km²)".to_string(),
                    values: vec!["560.5".to_string()],
                },
                IndicatorRow {
                    label: "Gentílico".to_string(),
                    values: vec!["araxaense".to_string()],
                },
            ],
        }
    }

    #[test]
    fn sheet_name_truncates_at_31_chars() {
        assert_eq!(sheet_name("short"), "short");
        let long = "a".repeat(40);
        assert_eq!(sheet_name(&long).chars().count(), SHEET_NAME_LIMIT);
        // Truncation counts characters, not bytes.
        let accented = "é".repeat(40);
        assert_eq!(sheet_name(&accented).chars().count(), SHEET_NAME_LIMIT);
    }

    #[test]
    fn workbook_bytes_are_a_zip_archive() {
        let tables = vec![
            TableResult::Ranked(ranked_table()),
            TableResult::Indicators(indicator_table()),
        ];
        let bytes = build_workbook(&tables).unwrap();
        // XLSX is a ZIP container.
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn unit_block_ranges_cover_every_entry() {
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let ranges = write_ranked_sheet(&mut workbook, &ranked_table(), &bold).unwrap();

        assert_eq!(ranges.len(), 1);
        let block = &ranges[0];
        assert_eq!(block.unit_name, "Araxá");
        assert_eq!(block.year_row, 1);
        assert_eq!(block.years, 2);
        assert_eq!(
            block.rows,
            vec![(2, "Milho (t)".to_string()), (3, "Soja (t)".to_string())]
        );
    }

    #[test]
    fn chart_sheet_skipped_when_blocks_are_empty() {
        let table = RankedTable {
            name: "Produção Agrícola Municipal".to_string(),
            years: vec![2023],
            units: vec![UnitBlock {
                unit_id: "100".to_string(),
                unit_name: "Araxá".to_string(),
                entries: vec![],
            }],
        };
        let bytes = build_workbook(&[TableResult::Ranked(table)]).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
