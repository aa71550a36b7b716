use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::Local;
use crossterm::event::{Event, KeyCode, MouseButton, MouseEvent, MouseEventKind};
use gridmate::{
    columns::{ColumnDef, ColumnPreferences, GridColumn},
    export::{DirectorySink, ExportColumn, LocalExporter, default_filename},
    notify::{NotificationKind, Notifier},
    query::{Query, QueryController, QueryStrategy, SortOrder, Sorter, apply_local_query},
    record::{Record, display_value},
    resize::{ColumnResizer, HeaderSurface},
    util::{fit, pad},
};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use serde_json::{Map, Value};

use super::theme::Theme;

type Row = Map<String, Value>;

/// Width units per terminal cell. Stored widths are in units so they stay
/// meaningful to grids that render in pixels.
pub const CELL_UNITS: f64 = 8.0;
pub const DEFAULT_COLUMN_WIDTH: f64 = 120.0;
const ROW_NUMBER_KEY: &str = "#";

#[derive(Debug, Clone)]
struct HeaderCell {
    key: String,
    title: String,
    units: f64,
    x: u16,
    cells: u16,
    resizable: bool,
}

/// Header row as last laid out, plus widths previewed by an active drag.
#[derive(Debug, Default)]
pub struct HeaderLayout {
    cells: Vec<HeaderCell>,
    previews: HashMap<String, f64>,
    origin_x: u16,
    y: u16,
}

impl HeaderLayout {
    fn relayout(&mut self) {
        let mut x = self.origin_x;
        for cell in &mut self.cells {
            let units = self.previews.get(&cell.key).copied().unwrap_or(cell.units);
            cell.x = x;
            cell.cells = cells_for(units);
            x = x.saturating_add(cell.cells).saturating_add(1);
        }
    }

    /// Column whose right border sits under `column`.
    fn edge_at(&self, column: u16) -> Option<&HeaderCell> {
        self.cells.iter().find(|cell| {
            let edge = cell.x.saturating_add(cell.cells);
            cell.resizable && (column == edge || column.saturating_add(1) == edge)
        })
    }

    fn cell_at(&self, column: u16) -> Option<&HeaderCell> {
        self.cells
            .iter()
            .find(|cell| column >= cell.x && column < cell.x.saturating_add(cell.cells))
    }
}

impl HeaderSurface for HeaderLayout {
    fn rendered_width(&self, key: &str) -> Option<f64> {
        self.previews.get(key).copied().or_else(|| {
            self.cells
                .iter()
                .find(|cell| cell.key == key)
                .map(|cell| cell.units)
        })
    }

    fn preview_width(&mut self, key: &str, width: f64) {
        self.previews.insert(key.to_string(), width);
        self.relayout();
    }
}

fn cells_for(units: f64) -> u16 {
    (units / CELL_UNITS).round().clamp(1.0, f64::from(u16::MAX)) as u16
}

/// Last notification, shown in the status line.
#[derive(Debug, Default)]
pub struct StatusLine {
    message: Mutex<Option<(NotificationKind, String)>>,
}

impl StatusLine {
    fn get(&self) -> Option<(NotificationKind, String)> {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Notifier for StatusLine {
    fn notify(&self, kind: NotificationKind, message: &str) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((kind, message.to_string()));
    }
}

pub struct GridView {
    grid_id: String,
    rows: Vec<Row>,
    columns: Vec<ColumnDef>,
    prefs: ColumnPreferences,
    controller: QueryController,
    strategy: QueryStrategy<Row>,
    resizer: ColumnResizer,
    header: HeaderLayout,
    area: Rect,
    selected: usize,
    editing: Option<String>,
    status: Arc<StatusLine>,
    should_quit: bool,
}

impl GridView {
    pub fn new(
        rows: Vec<Row>,
        prefs: ColumnPreferences,
        controller: QueryController,
        min_width: f64,
    ) -> Self {
        let status = Arc::new(StatusLine::default());
        let prefs = prefs.with_notifier(status.clone());
        let mut columns = vec![ColumnDef {
            key: ROW_NUMBER_KEY.to_string(),
            title: ROW_NUMBER_KEY.to_string(),
            width: Some(CELL_UNITS * row_number_cells(rows.len()) as f64),
        }];
        columns.extend(prefs.presets().iter().map(ColumnDef::from));
        Self {
            grid_id: prefs.grid_id().to_string(),
            rows,
            columns,
            prefs,
            controller,
            strategy: QueryStrategy::default(),
            resizer: ColumnResizer::new(min_width),
            header: HeaderLayout::default(),
            area: Rect::default(),
            selected: 0,
            editing: None,
            status,
            should_quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Recompute header positions for a table drawn at `area`.
    pub fn layout(&mut self, area: Rect) {
        self.area = area;
        let shaped = self.prefs.apply_to_columns(&self.columns);
        self.header.origin_x = area.x;
        self.header.y = area.y;
        self.header.cells = shaped
            .into_iter()
            .map(|column| HeaderCell {
                resizable: self.prefs.preset(column.key()).is_some(),
                units: column.width.unwrap_or(DEFAULT_COLUMN_WIDTH),
                key: column.key,
                title: column.title,
                x: 0,
                cells: 0,
            })
            .collect();
        self.header.relayout();
        self.selected = self.selected.min(self.selectable_keys().len().saturating_sub(1));
    }

    pub fn render(&mut self, frame: &mut Frame, theme: &Theme) {
        let [title_area, table_area, status_area, help_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .areas(frame.area());
        self.layout(table_area);

        let query = self.controller.query();
        let result = apply_local_query(&self.rows, &query, &self.strategy);
        let base = Style::default().fg(theme.text()).bg(theme.bg());

        let title = Line::from(vec![
            Span::styled(
                pad(&self.grid_id, 1),
                base.fg(theme.title()).add_modifier(Modifier::BOLD),
            ),
            Span::styled(query_summary(&query), base.fg(theme.muted())),
        ]);
        frame.render_widget(Paragraph::new(title).style(base), title_area);

        let selected_key = self.selected_key().map(str::to_string);
        let mut header = Vec::new();
        for cell in &self.header.cells {
            let mut style = base.fg(theme.header()).add_modifier(Modifier::BOLD);
            if selected_key.as_deref() == Some(cell.key.as_str()) {
                style = style.fg(theme.selected_header_fg()).bg(theme.selected_header_bg());
            }
            let mut title = cell.title.clone();
            if let Some((field, order)) = query.active_sort()
                && field == cell.key
            {
                title.push_str(match order {
                    SortOrder::Ascend => " ▲",
                    SortOrder::Descend => " ▼",
                });
            }
            header.push(Span::styled(fit(&title, cell.cells as usize), style));
            header.push(Span::styled("│", base.fg(theme.border())));
        }
        let mut lines = vec![Line::from(header)];
        let offset = result.window().start;
        for (idx, row) in result.list().iter().enumerate() {
            let style = if idx % 2 == 1 {
                base.bg(theme.stripe_bg())
            } else {
                base
            };
            let spans: Vec<Span> = self
                .header
                .cells
                .iter()
                .flat_map(|cell| {
                    let text = if !cell.resizable && cell.key == ROW_NUMBER_KEY {
                        (offset + idx + 1).to_string()
                    } else {
                        row.field(&cell.key)
                            .map(display_value)
                            .unwrap_or_default()
                            .replace('\n', " ")
                    };
                    [
                        Span::styled(fit(&text, cell.cells as usize), style),
                        Span::styled(" ", style),
                    ]
                })
                .collect();
            lines.push(Line::from(spans));
        }
        frame.render_widget(Paragraph::new(lines).style(base), table_area);

        let status = match &self.editing {
            Some(input) => Line::from(Span::styled(
                format!(" search: {input}▏"),
                base.fg(theme.title()),
            )),
            None => {
                let mut spans = vec![Span::styled(
                    page_summary(result.total(), &result.window(), query.page, query.page_size),
                    base.fg(theme.muted()),
                )];
                if let Some((kind, message)) = self.status.get() {
                    let color = match kind {
                        NotificationKind::Error => theme.error(),
                        NotificationKind::Success => theme.success(),
                        NotificationKind::Info => theme.muted(),
                    };
                    spans.push(Span::styled(pad(message, 2), base.fg(color)));
                }
                Line::from(spans)
            }
        };
        frame.render_widget(Paragraph::new(status).style(base), status_area);

        let help = " q quit  ←/→ page  tab column  s sort  h hide  r reset  c clear  / search  e export  drag │ resize";
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(help, base.fg(theme.muted())))).style(base),
            help_area,
        );
    }

    /// Returns true when the event was handled.
    pub fn handle_event(&mut self, event: &Event) -> bool {
        match event {
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => match event.as_key_press_event() {
                Some(key) => self.handle_key(key.code),
                None => false,
            },
        }
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent) -> bool {
        let x = f64::from(mouse.column) * CELL_UNITS;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if mouse.row == self.header.y => {
                if let Some(key) = self.header.edge_at(mouse.column).map(|cell| cell.key.clone()) {
                    return self.resizer.begin(&key, x, &self.header);
                }
                if let Some(key) = self.header.cell_at(mouse.column).map(|cell| cell.key.clone())
                    && self.prefs.preset(&key).is_some()
                {
                    self.cycle_sort(&key);
                    return true;
                }
                false
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.resizer.pointer_moved(x, &mut self.header).is_some()
            }
            MouseEventKind::Up(MouseButton::Left) if self.resizer.is_dragging() => {
                self.resizer.end(x, &mut self.prefs);
                self.header.previews.clear();
                self.layout(self.area);
                true
            }
            _ => false,
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> bool {
        if let Some(input) = self.editing.as_mut() {
            match code {
                KeyCode::Char(ch) => input.push(ch),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Enter => {
                    let keyword = self.editing.take().filter(|k| !k.trim().is_empty());
                    self.controller.set_keyword(keyword);
                }
                KeyCode::Esc => self.editing = None,
                _ => return false,
            }
            return true;
        }

        match code {
            KeyCode::Esc if self.resizer.is_dragging() => {
                self.resizer.abandon();
                self.header.previews.clear();
                self.layout(self.area);
            }
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Right | KeyCode::Char('n') => self.turn_page(true),
            KeyCode::Left | KeyCode::Char('p') => self.turn_page(false),
            KeyCode::Tab => {
                let count = self.selectable_keys().len();
                if count > 0 {
                    self.selected = (self.selected + 1) % count;
                }
            }
            KeyCode::BackTab => {
                let count = self.selectable_keys().len();
                if count > 0 {
                    self.selected = (self.selected + count - 1) % count;
                }
            }
            KeyCode::Char('s') => {
                if let Some(key) = self.selected_key().map(str::to_string) {
                    self.cycle_sort(&key);
                }
            }
            KeyCode::Char('h') => {
                if let Some(key) = self.selected_key().map(str::to_string) {
                    let visible: Vec<String> = self
                        .prefs
                        .visible_keys()
                        .iter()
                        .filter(|visible| **visible != key)
                        .cloned()
                        .collect();
                    self.prefs.set_visible_keys(visible);
                }
            }
            KeyCode::Char('r') => self.prefs.reset_to_default(),
            KeyCode::Char('/') => {
                self.editing = Some(self.controller.query().keyword.clone().unwrap_or_default());
            }
            KeyCode::Char('c') => self.controller.reset(),
            KeyCode::Char('e') => self.export(),
            _ => return false,
        }
        true
    }

    fn selectable_keys(&self) -> Vec<&str> {
        self.header
            .cells
            .iter()
            .filter(|cell| cell.resizable)
            .map(|cell| cell.key.as_str())
            .collect()
    }

    fn selected_key(&self) -> Option<&str> {
        self.selectable_keys().get(self.selected).copied()
    }

    fn cycle_sort(&mut self, key: &str) {
        let query = self.controller.query();
        let current = query
            .active_sort()
            .filter(|(field, _)| *field == key)
            .map(|(_, order)| order);
        let sorter = SortOrder::next(current).map(|order| Sorter::new(key, order));
        self.controller.set_sorter(sorter);
    }

    fn turn_page(&mut self, forward: bool) {
        let query = self.controller.query();
        let total = apply_local_query(&self.rows, &query, &self.strategy).total();
        let pages = total.div_ceil(query.page_size.max(1)).max(1);
        let page = if forward {
            (query.page + 1).min(pages)
        } else {
            query.page.saturating_sub(1).max(1)
        };
        if page != query.page {
            self.controller.set_page(page, None);
        }
    }

    fn export(&self) {
        let query = Query::clone(&self.controller.query()).with_page(0, 0);
        let result = apply_local_query(&self.rows, &query, &self.strategy);
        let exporter = LocalExporter::new(Arc::new(DirectorySink::current_dir()))
            .with_notifier(self.status.clone());
        let filename = default_filename(&self.grid_id, &Local::now());
        match exporter.export(
            result.filtered(),
            &ExportColumn::from_preferences(&self.prefs),
            &filename,
        ) {
            Ok(outcome) => tracing::debug!(?outcome, "Viewer export finished"),
            Err(err) => tracing::debug!(error = %err, grid = %self.grid_id, "Viewer export failed"),
        }
    }
}

fn row_number_cells(rows: usize) -> usize {
    rows.max(1).to_string().len().max(2)
}

fn query_summary(query: &Query) -> String {
    let mut parts = Vec::new();
    if let Some(keyword) = query.keyword() {
        parts.push(format!("search \"{keyword}\""));
    }
    for (field, value) in &query.filters {
        parts.push(format!("{field}={}", display_value(value)));
    }
    if let Some((field, order)) = query.active_sort() {
        parts.push(format!("sort {field} {order}"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" · {}", parts.join(" · "))
    }
}

fn page_summary(total: usize, window: &std::ops::Range<usize>, page: usize, page_size: usize) -> String {
    let pages = total.div_ceil(page_size.max(1)).max(1);
    if window.is_empty() {
        format!(" no rows · page {page}/{pages}")
    } else {
        format!(
            " rows {}-{} of {total} · page {page}/{pages}",
            window.start + 1,
            window.end
        )
    }
}
