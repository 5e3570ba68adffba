use anyhow::{Context, Result};
use clap::ValueEnum;
use csv::Writer;
use std::fs::File;
use std::io::Write;
use tracing::{debug, info};

use crate::batch::{BatchResult, BatchSummary, ResultRecord};
use crate::pacing::RunStatus;

/// Column layout of the CSV export
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CsvLayout {
    /// One row per record: source, suggested portal, domain, URL
    Rich,
    /// One row per input item: nome, regiao, Site_Encontrado
    Simple,
}

pub const RICH_HEADERS: [&str; 4] = ["Fonte Pesquisada", "Portal Principal Sugerido", "Site (Domínio)", "URL"];
pub const SIMPLE_HEADERS: [&str; 3] = ["nome", "regiao", "Site_Encontrado"];

pub fn export_csv(result: &BatchResult, layout: CsvLayout, output_path: &str) -> Result<()> {
    debug!("Exporting {} records to CSV ({:?} layout): {}", result.records.len(), layout, output_path);

    let file = File::create(output_path)
        .with_context(|| format!("Failed to create CSV file: {}", output_path))?;
    let mut wtr = Writer::from_writer(file);

    let rows = match layout {
        CsvLayout::Rich => write_rich_rows(&mut wtr, &result.records)?,
        CsvLayout::Simple => write_simple_rows(&mut wtr, &result.records)?,
    };

    wtr.flush()?;
    info!("Successfully exported {} rows to CSV: {}", rows, output_path);

    Ok(())
}

fn write_rich_rows<W: Write>(wtr: &mut Writer<W>, records: &[ResultRecord]) -> Result<usize> {
    wtr.write_record(RICH_HEADERS)?;

    for record in records {
        wtr.write_record([
            record.source_name.as_str(),
            record.suggested_site.as_deref().unwrap_or(""),
            record.domain.as_str(),
            record.url.as_str(),
        ])?;
    }

    Ok(records.len())
}

/// First record of each item, in input order
fn first_record_per_item(records: &[ResultRecord]) -> Vec<&ResultRecord> {
    let mut firsts: Vec<&ResultRecord> = Vec::new();
    for record in records {
        if firsts.last().map(|last| last.item_index) != Some(record.item_index) {
            firsts.push(record);
        }
    }
    firsts
}

fn write_simple_rows<W: Write>(wtr: &mut Writer<W>, records: &[ResultRecord]) -> Result<usize> {
    wtr.write_record(SIMPLE_HEADERS)?;

    let rows = first_record_per_item(records);
    for record in &rows {
        wtr.write_record([
            record.source_name.as_str(),
            record.region.as_deref().unwrap_or(""),
            // The official-site hit when that query ran, else the best general hit
            record.suggested_site.as_deref().unwrap_or(&record.url),
        ])?;
    }

    Ok(rows.len())
}

pub fn export_json(result: &BatchResult, output_path: &str) -> Result<()> {
    debug!("Exporting {} records to JSON: {}", result.records.len(), output_path);

    let json_string = serde_json::to_string_pretty(&JsonExport {
        status: result.status,
        summary: &result.summary,
        records: &result.records,
    })?;

    let mut file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON file: {}", output_path))?;
    file.write_all(json_string.as_bytes())?;

    info!("Successfully exported {} records to JSON: {}", result.records.len(), output_path);

    Ok(())
}

#[derive(serde::Serialize)]
struct JsonExport<'a> {
    status: RunStatus,
    summary: &'a BatchSummary,
    records: &'a [ResultRecord],
}

pub fn print_batch_summary(result: &BatchResult) {
    let summary = &result.summary;

    if summary.total_items == 0 {
        println!("Nenhum item para pesquisar.");
        return;
    }

    println!("\n=== Resultado por item ===");
    println!("Itens: {} | Registros: {}", summary.total_items, summary.total_records);
    println!("  Com site encontrado: {}", summary.found);
    println!("  Sem resultado: {}", summary.not_found);
    if summary.failed > 0 {
        println!("  Falha na busca: {}", summary.failed);
    }
    if summary.invalid > 0 {
        println!("  Entrada inválida: {}", summary.invalid);
    }
    if summary.blocked > 0 || summary.not_searched > 0 {
        println!("  Bloqueado: {} | Não pesquisado: {}", summary.blocked, summary.not_searched);
    }
    println!("==========================\n");
}
