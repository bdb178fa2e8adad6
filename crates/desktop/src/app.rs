//! Routechat Desktop — egui app state and UI.

use eframe::egui;
use lib::catalog;
use lib::chat::{ChatController, ChatError, PendingTurn};
use lib::llm::{CompletionError, OpenRouterClient};
use lib::session::{Message, Role, SessionStore, ThreadId};
use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Mutex, OnceLock};

const CHAT_INPUT_HEIGHT: f32 = 90.0;
const CHAT_MESSAGES_MIN_HEIGHT: f32 = 80.0;
const LOG_BUFFER_MAX_LINES: usize = 2000;

/// Ring buffer of log lines for the Logs screen. Written by DesktopLogger.
static LOG_LINES: OnceLock<Mutex<VecDeque<String>>> = OnceLock::new();

fn log_buffer() -> &'static Mutex<VecDeque<String>> {
    LOG_LINES.get_or_init(|| Mutex::new(VecDeque::new()))
}

fn push_log_line(line: String) {
    if let Ok(mut buf) = log_buffer().lock() {
        buf.push_back(line);
        while buf.len() > LOG_BUFFER_MAX_LINES {
            buf.pop_front();
        }
    }
}

/// Logger that appends to LOG_LINES for display in the Logs screen.
/// Our own crates log at debug; dependencies (eframe, reqwest, ...) only from info up.
struct DesktopLogger;

impl log::Log for DesktopLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        let ours = metadata.target().starts_with("lib") || metadata.target().starts_with("desktop");
        if ours {
            metadata.level() <= log::Level::Debug
        } else {
            metadata.level() <= log::Level::Info
        }
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        push_log_line(format!(
            "{} [{}] {}: {}",
            clock_utc(),
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// HH:MM:SS.mmm (UTC) for log lines.
fn clock_utc() -> String {
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = t.as_secs();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        t.subsec_millis()
    )
}

static LOGGER: DesktopLogger = DesktopLogger;

/// Route `log` output to the Logs screen. Call once, before anything logs.
pub fn install_logger() {
    let _ = log_buffer();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Debug);
    }
}

/// Everything a chat needs: threads, the controller, and a runtime for completion calls.
pub struct ChatContext {
    store: SessionStore,
    controller: ChatController<OpenRouterClient>,
    runtime: tokio::runtime::Runtime,
}

impl ChatContext {
    /// Build from the default config file and environment.
    pub fn from_config() -> anyhow::Result<Self> {
        let (config, path) = lib::config::load_config(None)?;
        let settings = lib::config::resolve_provider(&config);
        if settings.api_key.is_none() {
            log::warn!(
                "no API key configured ({} or provider.apiKey in {}); requests will be rejected",
                lib::config::ENV_API_KEY,
                path.display()
            );
        }
        let client = OpenRouterClient::new(settings)?;
        log::info!("desktop: completions via {}", client.settings().endpoint);
        let controller = ChatController::new(client)
            .with_system_prompt(lib::config::resolve_system_prompt(&config));
        let store = SessionStore::with_default_model(lib::config::resolve_default_model(&config));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;
        Ok(Self {
            store,
            controller,
            runtime,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
enum Screen {
    #[default]
    Chat,
    Models,
    Logs,
}

/// What the user did in the threads panel this frame (applied after the list is drawn).
enum ThreadAction {
    Select(ThreadId),
    Delete(ThreadId),
    New,
}

/// Snapshot of one row in the threads panel.
struct ThreadRow {
    id: ThreadId,
    title: String,
    detail: String,
    active: bool,
}

pub struct RoutechatApp {
    chat: ChatContext,
    /// Current input text for the chat box.
    chat_input: String,
    /// Last error from a chat turn and the thread it belongs to.
    chat_error: Option<(ThreadId, String)>,
    /// Turn whose completion call is in flight.
    pending_turn: Option<PendingTurn>,
    /// When Some, a completion call is in flight; we read the result here.
    turn_receiver: Option<mpsc::Receiver<Result<String, CompletionError>>>,
    current_screen: Screen,
}

impl RoutechatApp {
    /// Space between the screen title and the content below.
    const SCREEN_TITLE_BOTTOM_SPACING: f32 = 18.0;
    /// Space between the bottom of the content and the window edge.
    const SCREEN_FOOTER_SPACING: f32 = 24.0;

    pub fn new(_cc: &eframe::CreationContext<'_>, chat: ChatContext) -> Self {
        log::info!("desktop started");
        Self {
            chat,
            chat_input: String::new(),
            chat_error: None,
            pending_turn: None,
            turn_receiver: None,
            current_screen: Screen::default(),
        }
    }

    /// Record the user's message and run the completion call on the background runtime.
    fn start_chat_turn(&mut self, ctx: &egui::Context) {
        if self.turn_receiver.is_some() {
            return;
        }
        let text = std::mem::take(&mut self.chat_input);
        let thread_id = self.chat.store.active_id().to_string();
        let turn = match self.chat.controller.begin_submit(&mut self.chat.store, &text) {
            Ok(Some(turn)) => turn,
            Ok(None) => return,
            Err(e) => {
                self.chat_input = text;
                self.chat_error = Some((thread_id, e.to_string()));
                return;
            }
        };
        self.chat_error = None;

        let request_turn = turn.clone();
        let backend = self.chat.controller.backend().clone();
        let repaint = ctx.clone();
        let (tx, rx) = mpsc::channel();
        self.chat.runtime.spawn(async move {
            let result = request_turn.send(&backend).await;
            let _ = tx.send(result);
            repaint.request_repaint();
        });
        self.pending_turn = Some(turn);
        self.turn_receiver = Some(rx);
    }

    /// Poll for the in-flight completion and record it. Call each frame.
    fn poll_chat_turn(&mut self) {
        let Some(rx) = &self.turn_receiver else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(mpsc::TryRecvError::Empty) => return,
            Err(mpsc::TryRecvError::Disconnected) => Err(CompletionError::Interrupted),
        };
        self.turn_receiver = None;
        let Some(turn) = self.pending_turn.take() else {
            return;
        };
        let thread_id = turn.thread_id().to_string();
        match self
            .chat
            .controller
            .finish_submit(&mut self.chat.store, turn, result)
        {
            Ok(_) => {}
            Err(ChatError::NotFound(id)) => {
                log::info!("desktop: reply for deleted thread {} dropped", id);
            }
            Err(e) => self.chat_error = Some((thread_id, e.to_string())),
        }
    }

    fn awaiting_reply_for(&self, thread_id: &str) -> bool {
        self.pending_turn
            .as_ref()
            .map(|t| t.thread_id() == thread_id)
            .unwrap_or(false)
    }

    fn apply_thread_action(&mut self, action: ThreadAction) {
        match action {
            ThreadAction::New => {
                self.chat.store.create_thread();
            }
            ThreadAction::Select(id) => {
                if let Err(e) = self.chat.store.set_active(&id) {
                    log::warn!("desktop: {}", e);
                }
            }
            ThreadAction::Delete(id) => {
                if self
                    .chat_error
                    .as_ref()
                    .map(|(t, _)| *t == id)
                    .unwrap_or(false)
                {
                    self.chat_error = None;
                }
                self.chat.store.delete_thread(&id);
            }
        }
    }

    /// Renders a single chat message: frame with role-based fill, content, and the model for replies.
    fn render_chat_message(ui: &mut egui::Ui, m: &Message) {
        let is_user = m.role == Role::User;
        let frame = egui::Frame::none()
            .fill(if is_user {
                ui.style().visuals.extreme_bg_color
            } else {
                ui.style().visuals.panel_fill
            })
            .stroke(egui::Stroke::new(
                1.0,
                ui.style().visuals.widgets.noninteractive.bg_stroke.color,
            ))
            .rounding(egui::Rounding::same(8.0))
            .inner_margin(egui::Margin::same(8.0));

        frame.show(ui, |ui| {
            if is_user {
                ui.label(egui::RichText::new(&m.content).strong());
            } else {
                ui.label(&m.content);
                if let Some(model) = m.model_used {
                    ui.add_space(4.0);
                    ui.label(egui::RichText::new(model.display_name).small().weak())
                        .on_hover_text(model.api_identifier);
                }
            }
        });
    }

    /// Threads list: newest first, with new/select/delete.
    fn ui_threads_panel(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Threads");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let rows: Vec<ThreadRow> = self
            .chat
            .store
            .list_threads()
            .iter()
            .map(|t| ThreadRow {
                id: t.id.clone(),
                title: t.title.clone(),
                detail: format!(
                    "{} · {} messages · {}",
                    t.created_at.format("%H:%M:%S"),
                    t.messages.len(),
                    t.selected_model.display_name
                ),
                active: t.id == self.chat.store.active_id(),
            })
            .collect();

        let mut action = None;
        if ui.button("New chat").clicked() {
            action = Some(ThreadAction::New);
        }
        ui.add_space(8.0);
        egui::ScrollArea::vertical().show(ui, |ui| {
            for row in &rows {
                let busy = self.awaiting_reply_for(&row.id);
                ui.horizontal(|ui| {
                    let delete = ui.add_enabled(!busy, egui::Button::new("🗑").small());
                    if delete.on_hover_text("Delete thread").clicked() {
                        action = Some(ThreadAction::Delete(row.id.clone()));
                    }
                    let label = if busy {
                        format!("{} …", row.title)
                    } else {
                        row.title.clone()
                    };
                    if ui
                        .selectable_label(row.active, label)
                        .on_hover_text(row.detail.as_str())
                        .clicked()
                    {
                        action = Some(ThreadAction::Select(row.id.clone()));
                    }
                });
            }
        });
        if let Some(action) = action {
            self.apply_thread_action(action);
        }
    }

    /// Chat screen: model picker, messages (stick to bottom), input row.
    fn ui_chat(&mut self, ui: &mut egui::Ui) {
        let ctx = ui.ctx().clone();
        let awaiting = self.chat.controller.is_awaiting_reply();
        let active = self.chat.store.active();
        let active_id = active.id.clone();
        let current_model = active.selected_model;
        let messages: Vec<Message> = active.messages.clone();
        let title = active.title.clone();

        ui.add_space(24.0);
        ui.horizontal(|ui| {
            ui.heading(title);
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let mut chosen: Option<&'static str> = None;
                ui.add_enabled_ui(!self.awaiting_reply_for(&active_id), |ui| {
                    egui::ComboBox::from_id_source("model_select")
                        .selected_text(current_model.display_name)
                        .show_ui(ui, |ui| {
                            for m in catalog::models() {
                                if ui
                                    .selectable_label(m == current_model, m.display_name)
                                    .on_hover_text(m.description)
                                    .clicked()
                                {
                                    chosen = Some(m.display_name);
                                }
                            }
                        });
                });
                ui.label("Model");
                if let Some(name) = chosen {
                    if let Err(e) =
                        self.chat
                            .controller
                            .set_model(&mut self.chat.store, &active_id, name)
                    {
                        self.chat_error = Some((active_id.clone(), e.to_string()));
                    }
                }
            });
        });
        ui.label(
            egui::RichText::new(format!(
                "Powered by {} via OpenRouter",
                current_model.api_identifier
            ))
            .weak(),
        );
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let row_height = ui.spacing().interact_size.y + 8.0;
        let bottom_section_height =
            CHAT_INPUT_HEIGHT + 8.0 + row_height * 2.0 + Self::SCREEN_FOOTER_SPACING;
        let messages_height =
            (ui.available_height() - bottom_section_height).max(CHAT_MESSAGES_MIN_HEIGHT);
        let width = ui.available_width();
        ui.allocate_ui(egui::vec2(width, messages_height), |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .max_height(messages_height)
                .show(ui, |ui| {
                    // Keep the scrollbar on the right even when messages are narrow
                    ui.allocate_exact_size(egui::vec2(ui.available_width(), 0.0), egui::Sense::hover());
                    if messages.is_empty() {
                        ui.label(egui::RichText::new("Ask anything to start this thread.").weak());
                    }
                    for m in &messages {
                        Self::render_chat_message(ui, m);
                        ui.add_space(8.0);
                    }
                    if self.awaiting_reply_for(&active_id) {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Thinking…");
                        });
                    }
                });
        });

        ui.add_space(8.0);
        let input = ui.add_enabled(
            !awaiting,
            egui::TextEdit::multiline(&mut self.chat_input)
                .desired_width(f32::INFINITY)
                .desired_rows(4)
                .hint_text("Type a message (Ctrl+Enter to send)"),
        );
        ui.add_space(8.0);
        let mut send_now = false;
        ui.horizontal(|ui| {
            let can_send = !awaiting && !self.chat_input.trim().is_empty();
            if ui.add_enabled(can_send, egui::Button::new("Send")).clicked() {
                send_now = true;
            }
            if awaiting && !self.awaiting_reply_for(&active_id) {
                ui.label(egui::RichText::new("Waiting for a reply in another thread…").weak());
            }
        });
        if !awaiting && input.has_focus() {
            let pressed = ui.input(|i| {
                (i.modifiers.command || i.modifiers.ctrl) && i.key_pressed(egui::Key::Enter)
            });
            if pressed {
                send_now = true;
            }
        }
        if send_now {
            self.start_chat_turn(&ctx);
        }

        if let Some((thread, err)) = &self.chat_error {
            if *thread == active_id {
                ui.add_space(8.0);
                ui.colored_label(
                    egui::Color32::RED,
                    format!("Failed to get a reply: {}", err),
                );
            }
        }
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_models_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Models");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);
        let default_model = self.chat.store.default_model();
        egui::Grid::new("models_grid")
            .num_columns(3)
            .spacing([24.0, 8.0])
            .striped(true)
            .show(ui, |ui| {
                ui.strong("Name");
                ui.strong("Identifier");
                ui.strong("Description");
                ui.end_row();
                for m in catalog::models() {
                    if m == default_model {
                        ui.label(format!("{} (default)", m.display_name));
                    } else {
                        ui.label(m.display_name);
                    }
                    ui.monospace(m.api_identifier);
                    ui.label(m.description);
                    ui.end_row();
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }

    fn ui_logs_screen(&self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Logs");
        ui.add_space(Self::SCREEN_TITLE_BOTTOM_SPACING);

        let lines: Vec<String> = log_buffer()
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default();

        let scroll_height = (ui.available_height() - Self::SCREEN_FOOTER_SPACING).max(0.0);
        egui::ScrollArea::vertical()
            .max_height(scroll_height)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &lines {
                    ui.label(
                        egui::RichText::new(line.as_str()).family(egui::FontFamily::Monospace),
                    );
                }
                if lines.is_empty() {
                    ui.label("No log output yet.");
                }
            });
        ui.add_space(Self::SCREEN_FOOTER_SPACING);
    }
}

impl eframe::App for RoutechatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_chat_turn();

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| {
                    ui.add_space(12.0);
                    ui.heading("Routechat");
                    ui.add_space(12.0);
                });
        });

        let current_screen = &mut self.current_screen;
        egui::SidePanel::left("sidebar")
            .resizable(false)
            .exact_width(120.0)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                    .show(ui, |ui| {
                        ui.add_space(24.0);
                        for (screen, label) in [
                            (Screen::Chat, "Chat"),
                            (Screen::Models, "Models"),
                            (Screen::Logs, "Logs"),
                        ] {
                            if ui.selectable_label(*current_screen == screen, label).clicked() {
                                *current_screen = screen;
                            }
                            ui.add_space(12.0);
                        }
                    });
            });

        if self.current_screen == Screen::Chat {
            egui::SidePanel::right("threads_panel")
                .resizable(false)
                .exact_width(240.0)
                .show(ctx, |ui| {
                    egui::Frame::none()
                        .inner_margin(egui::Margin::symmetric(16.0, 0.0))
                        .show(ui, |ui| self.ui_threads_panel(ui));
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::symmetric(24.0, 0.0))
                .show(ui, |ui| match self.current_screen {
                    Screen::Chat => self.ui_chat(ui),
                    Screen::Models => self.ui_models_screen(ui),
                    Screen::Logs => self.ui_logs_screen(ui),
                });
        });
    }
}
