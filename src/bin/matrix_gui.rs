//! volmatrix GUI
//!
//! Interactive IV matrix: ticker input, call/put toggle, sortable headers,
//! color-coded cells, paging and a smile plot for the selected expiration.

use eframe::egui;
use egui_plot::{Line, Plot, PlotPoints, VLine};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use volmatrix::prelude::*;

type FetchResult = (RequestToken, MatrixResult<Vec<OptionContract>>);

struct MatrixApp {
    state: DashboardState,
    source: Arc<SnapshotClient>,
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,

    // UI state
    ticker_input: String,
    side: ContractType,
    selected_column: usize,
    show_plot: bool,
}

impl MatrixApp {
    fn new(source: SnapshotClient) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: DashboardState::new(ContractType::Call, 25),
            source: Arc::new(source),
            tx,
            rx,
            ticker_input: "SPY".to_string(),
            side: ContractType::Call,
            selected_column: 0,
            show_plot: true,
        }
    }

    /// Start a background fetch; the matrix is built when all pages are in
    fn submit(&mut self, ctx: &egui::Context) {
        if !self.state.can_submit() {
            return;
        }
        let token = match self.state.begin_fetch(&self.ticker_input, self.side) {
            Ok(t) => t,
            Err(_) => return,
        };

        let symbol = self.ticker_input.clone();
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        let ctx = ctx.clone();

        thread::spawn(move || {
            let result = source.fetch_chain(&symbol);
            if tx.send((token, result)).is_err() {
                tracing::debug!("Dashboard closed before fetch finished");
            }
            ctx.request_repaint();
        });
    }

    fn poll_fetches(&mut self) {
        while let Ok((token, result)) = self.rx.try_recv() {
            let outcome = self.state.complete_fetch(token, result);
            if outcome == FetchOutcome::Applied {
                self.selected_column = 0;
            }
            self.side = toggle_side(&self.state, outcome, self.side);
        }
    }

    fn controls(&mut self, ctx: &egui::Context, ui: &mut egui::Ui) {
        ui.heading("Volatility Matrix");
        ui.separator();

        let enabled = self.state.can_submit();

        ui.horizontal(|ui| {
            ui.label("Ticker:");
            let edit = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.ticker_input).desired_width(80.0),
            );
            if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.submit(ctx);
            }
        });

        ui.horizontal(|ui| {
            for side in [ContractType::Call, ContractType::Put] {
                let label = if side == ContractType::Call { "Calls" } else { "Puts" };
                let clicked = ui
                    .add_enabled(enabled, egui::SelectableLabel::new(self.side == side, label))
                    .clicked();
                if clicked && self.side != side {
                    self.side = side;
                    if self.state.matrix().is_some() {
                        self.submit(ctx);
                    }
                }
            }
        });

        if ui.add_enabled(enabled, egui::Button::new("Fetch")).clicked() {
            self.submit(ctx);
        }

        if let FetchPhase::Loading { symbol, .. } = self.state.phase() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(format!("Fetching {}...", symbol));
            });
        }
        if let Some(err) = self.state.error() {
            ui.colored_label(egui::Color32::LIGHT_RED, err);
        }

        if let Some(m) = self.state.matrix() {
            ui.separator();
            ui.label(format!("Symbol: {}", self.state.symbol()));
            ui.label(format!("Side: {}s", m.contract_type()));
            ui.label(format!("Spot: ${:.2}", m.underlying_price()));
            ui.label(format!("Strikes: {}", m.strikes().len()));
            ui.label(format!("Expiries: {}", m.expirations().len()));
            ui.label(format!("Quoted cells: {}", m.quoted_cells()));
            if let Some(stats) = self.state.stats() {
                if stats.duplicates > 0 {
                    ui.label(format!("Duplicates overwritten: {}", stats.duplicates));
                }
            }
        }

        ui.separator();
        ui.heading("Display");
        let mut page_size = self.state.page_size();
        ui.horizontal(|ui| {
            ui.label("Rows/page:");
            ui.add(egui::DragValue::new(&mut page_size).clamp_range(0..=500));
        });
        if page_size != self.state.page_size() {
            self.state.set_page_size(page_size);
        }
        ui.checkbox(&mut self.show_plot, "Show smile plot");

        if self.state.sort_config().is_some() && ui.button("Clear sort").clicked() {
            self.state.clear_sort();
        }

        ui.separator();
        ui.heading("Legend");
        for (bucket, text) in [
            (ColorBucket::StrongCold, "≤ -5 vol pts vs middle strike"),
            (ColorBucket::MildCold, "below middle strike"),
            (ColorBucket::Neutral, "equal"),
            (ColorBucket::MildHot, "above middle strike"),
            (ColorBucket::StrongHot, "≥ +5 vol pts"),
        ] {
            ui.horizontal(|ui| {
                ui.label(cell_text("    ", bucket));
                ui.label(text);
            });
        }
    }

    fn header_label(&self, key: SortKey, text: String) -> String {
        match self.state.sort_config() {
            Some(cfg) if cfg.key == key => format!("{} {}", text, cfg.direction.arrow()),
            _ => text,
        }
    }

    fn sort_by(&mut self, key: SortKey) {
        let selected = self
            .state
            .matrix()
            .and_then(|m| m.expirations().get(self.selected_column).copied());
        if let Err(e) = self.state.request_sort(key) {
            self.state.set_error(e.to_string());
        }
        // keep the smile on the same expiration when columns move
        if let (Some(date), Some(m)) = (selected, self.state.matrix()) {
            if let Some(j) = m.expirations().iter().position(|d| *d == date) {
                self.selected_column = j;
            }
        }
    }

    fn matrix_table(&mut self, ui: &mut egui::Ui) {
        let Some(matrix) = self.state.matrix().cloned() else {
            ui.label("Enter a ticker and click 'Fetch'");
            return;
        };
        let Some(page) = self.state.row_page() else {
            return;
        };

        ui.horizontal(|ui| {
            let label = self.header_label(SortKey::Expiration, "Sort expirations".into());
            if ui.button(label).clicked() {
                self.sort_by(SortKey::Expiration);
            }
            ui.separator();
            if ui.add_enabled(page.has_prev(), egui::Button::new("◀")).clicked() {
                self.state.prev_page();
            }
            ui.label(format!("Page {}/{}", page.page + 1, page.page_count));
            if ui.add_enabled(page.has_next(), egui::Button::new("▶")).clicked() {
                self.state.next_page();
            }
            if ui.button("ATM").clicked() {
                if let Some(row) = nearest_row(&matrix) {
                    let target = RowPage::containing(matrix.dims().0, row, self.state.page_size());
                    self.state.set_page(target.page);
                }
            }
        });

        let colors = matrix.color_grid();
        let flags = matrix.moneyness_flags();
        let mut clicked: Option<SortKey> = None;

        egui::ScrollArea::both()
            .max_height(ui.available_height() * if self.show_plot { 0.6 } else { 1.0 })
            .show(ui, |ui| {
                egui::Grid::new("iv_matrix")
                    .striped(true)
                    .spacing([6.0, 2.0])
                    .show(ui, |ui| {
                        if ui
                            .button(self.header_label(SortKey::Strike, "Strike".into()))
                            .clicked()
                        {
                            clicked = Some(SortKey::Strike);
                        }
                        for j in 0..matrix.expirations().len() {
                            let label = matrix.expiration_label(j).unwrap_or_default();
                            let key = SortKey::IvAtExpiration(j);
                            let text = self.header_label(key, label);
                            let button = egui::Button::new(text).selected(self.selected_column == j);
                            if ui.add(button).clicked() {
                                self.selected_column = j;
                                clicked = Some(key);
                            }
                        }
                        ui.end_row();

                        for i in page.rows.clone() {
                            let strike = egui::RichText::new(format!("{:.2}", matrix.strikes()[i]));
                            let strike = match flags[i] {
                                MoneynessFlag::Atm => strike.strong().color(egui::Color32::YELLOW),
                                MoneynessFlag::NearAtm => strike.strong(),
                                MoneynessFlag::Away => strike,
                            };
                            ui.label(strike);

                            for j in 0..matrix.expirations().len() {
                                if matrix.is_empty_cell(i, j) {
                                    ui.label("-");
                                } else {
                                    let text = format!("{:.1}%", matrix.ivs()[[i, j]] * 100.0);
                                    ui.label(cell_text(&text, colors[[i, j]]));
                                }
                            }
                            ui.end_row();
                        }
                    });
            });

        if let Some(key) = clicked {
            self.sort_by(key);
        }
    }

    fn smile_plot(&self, ui: &mut egui::Ui) {
        let Some(matrix) = self.state.matrix() else {
            return;
        };
        let Some(column) = matrix.column(self.selected_column) else {
            return;
        };

        let mut points: Vec<[f64; 2]> = matrix
            .strikes()
            .iter()
            .zip(column.iter())
            .filter(|(_, iv)| **iv > 0.0)
            .map(|(&k, &iv)| [k, iv * 100.0])
            .collect();
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));

        ui.separator();
        ui.heading(format!(
            "Smile: {}",
            matrix.expiration_label(self.selected_column).unwrap_or_default()
        ));

        Plot::new("iv_smile")
            .view_aspect(3.0)
            .x_axis_label("Strike")
            .y_axis_label("Implied Vol (%)")
            .show(ui, |plot_ui| {
                if !points.is_empty() {
                    plot_ui.line(
                        Line::new(PlotPoints::new(points))
                            .name("Implied Vol")
                            .color(egui::Color32::LIGHT_BLUE)
                            .width(2.0),
                    );
                }
                plot_ui.vline(
                    VLine::new(matrix.underlying_price())
                        .name("Spot")
                        .color(egui::Color32::YELLOW)
                        .width(1.5)
                        .style(egui_plot::LineStyle::Dashed { length: 5.0 }),
                );
            });
    }
}

/// Side the call/put toggle shows after a fetch completes: the side of the
/// matrix on screen, or the requested side while nothing is loaded.
fn toggle_side(state: &DashboardState, outcome: FetchOutcome, requested: ContractType) -> ContractType {
    match outcome {
        FetchOutcome::Stale => requested,
        _ if state.matrix().is_none() => requested,
        _ => state.contract_type(),
    }
}

/// Row whose strike is closest to the underlying
fn nearest_row(matrix: &SurfaceMatrix) -> Option<usize> {
    let spot = matrix.underlying_price();
    matrix
        .strikes()
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - spot).abs().total_cmp(&(*b - spot).abs()))
        .map(|(i, _)| i)
}

fn cell_text(text: &str, bucket: ColorBucket) -> egui::RichText {
    let (r, g, b) = bucket.rgb();
    let fg = if bucket.light_text() {
        egui::Color32::WHITE
    } else {
        egui::Color32::BLACK
    };
    egui::RichText::new(text)
        .monospace()
        .color(fg)
        .background_color(egui::Color32::from_rgb(r, g, b))
}

impl eframe::App for MatrixApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_fetches();
        if self.state.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        egui::SidePanel::left("controls").show(ctx, |ui| {
            self.controls(ctx, ui);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.matrix_table(ui);
            if self.show_plot {
                self.smile_plot(ui);
            }
        });
    }
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::level_filters::LevelFilter::INFO.into()),
        )
        .init();

    let source = match ApiKey::new(std::env::var("POLYGON_API_KEY").unwrap_or_default())
        .and_then(|key| SnapshotClient::new(FetchConfig::new(key)))
    {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {} (set POLYGON_API_KEY)", e);
            std::process::exit(1);
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 900.0])
            .with_title("volmatrix - Implied Volatility Matrix"),
        ..Default::default()
    };

    eframe::run_native(
        "volmatrix",
        options,
        Box::new(move |_cc| Box::new(MatrixApp::new(source))),
    )
}
