use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use genosub_model::ReportState;

use crate::types::ValidateResult;

pub fn print_summary(result: &ValidateResult) {
    println!("Project: {}", result.project_key);
    println!("Release: {}", result.release_name);
    if let Some(path) = &result.report_path {
        println!("Report: {}", path.display());
    }
    println!("{}", summary_table(result));

    if !result.planning_errors.is_empty() {
        eprintln!("Planning errors:");
        for error in &result.planning_errors {
            eprintln!("- {error}");
        }
    }
    if !result.failures.is_empty() {
        eprintln!("Failures:");
        for failure in &result.failures {
            eprintln!("- {failure}");
        }
    }
}

/// The per-data-type summary table with a trailing TOTAL row.
pub fn summary_table(result: &ValidateResult) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Data type"),
        header_cell("State"),
        header_cell("Files"),
        header_cell("Errors"),
    ]);
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);

    let mut total_files = 0usize;
    let mut total_errors = 0usize;
    for summary in &result.data_types {
        total_files += summary.files;
        total_errors += summary.errors;
        table.add_row(vec![
            Cell::new(&summary.data_type)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            state_cell(summary.state),
            Cell::new(summary.files),
            count_cell(summary.errors),
        ]);
    }
    table.add_row(vec![
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        state_cell(result.state),
        Cell::new(total_files).add_attribute(Attribute::Bold),
        count_cell(total_errors).add_attribute(Attribute::Bold),
    ]);
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn state_cell(state: ReportState) -> Cell {
    match state {
        ReportState::Valid => Cell::new("VALID")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold),
        ReportState::Invalid => Cell::new("INVALID")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        ReportState::Error => Cell::new("ERROR")
            .fg(Color::Red)
            .add_attribute(Attribute::Bold),
        ReportState::NotValidated => Cell::new("NOT_VALIDATED").fg(Color::DarkGrey),
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize) -> Cell {
    if count > 0 {
        Cell::new(count).fg(Color::Red).add_attribute(Attribute::Bold)
    } else {
        Cell::new(count).fg(Color::DarkGrey)
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}
