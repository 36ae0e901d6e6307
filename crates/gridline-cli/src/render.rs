//! Terminal rendering of a grid page

use comfy_table::{Cell, ContentArrangement, Table, presets::UTF8_FULL};
use gridline_core::{Paginator, Row, Value};
use gridline_grid::{Column, GridView};

pub fn table(view: &GridView) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(view.columns.iter().map(|column| Cell::new(header(column))));

    for row in view.rows.iter() {
        table.add_row(
            view.columns
                .iter()
                .map(|column| Cell::new(cell(row, column))),
        );
    }
    table
}

fn header(column: &Column) -> String {
    if column.is_sortable() {
        format!("{} ↕", column.label())
    } else {
        column.label().to_string()
    }
}

/// Rows carry plain column names, so a qualified `p.name` is looked up as
/// `name` when the full key is absent
fn cell(row: &Row, column: &Column) -> String {
    let key = column.column();
    let value = row.get_by_name(key).or_else(|| {
        key.rsplit_once('.')
            .and_then(|(_, name)| row.get_by_name(name))
    });
    match value {
        Some(Value::Null) | None => "NULL".to_string(),
        Some(value) => value.to_string(),
    }
}

/// `‹ 1 2 3 4 [5] 6 7 8 … 10 ›  41-50 of 95`
pub fn pager(paginator: &Paginator) -> String {
    let mut parts = Vec::new();
    if paginator.has_prev() {
        parts.push("‹".to_string());
    }

    let mut previous = None;
    for step in paginator.steps() {
        if let Some(previous) = previous
            && step > previous + 1
        {
            parts.push("…".to_string());
        }
        if step == paginator.page() {
            parts.push(format!("[{}]", step));
        } else {
            parts.push(step.to_string());
        }
        previous = Some(step);
    }

    if paginator.has_next() {
        parts.push("›".to_string());
    }

    format!(
        "{}  {}-{} of {}",
        parts.join(" "),
        paginator.count_begin(),
        paginator.count_end(),
        paginator.item_count()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pager_marks_gaps_and_current_page() {
        let paginator = Paginator::new(10).with_item_count(95).with_page(5);
        assert_eq!(
            pager(&paginator),
            "‹ 1 2 3 4 [5] 6 7 8 … 10 ›  41-50 of 95"
        );
    }

    #[test]
    fn test_pager_for_empty_result() {
        let paginator = Paginator::new(10);
        assert_eq!(pager(&paginator), "[1]  0-0 of 0");
    }

    #[test]
    fn test_cell_falls_back_to_unqualified_name() {
        let row = Row::from_pairs([("name", Value::from("Anna")), ("city", Value::Null)]);
        let qualified = Column::new("p.name", "Name");
        assert_eq!(cell(&row, &qualified), "Anna");
        assert_eq!(cell(&row, &Column::new("city", "City")), "NULL");
    }
}
