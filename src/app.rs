//! Virtual mic setup window: egui/eframe application.
//!
//! # Architecture
//!
//! [`VirtualMicApp`] is the top-level [`eframe::App`].  It owns the log
//! transcript, the start-control state and a [`Provisioner`], and drains one
//! channel endpoint:
//!
//! * `events`: receives [`UiEvent`]s posted by the provisioning worker
//!   through a [`ChannelSink`](crate::notify::ChannelSink).
//!
//! # Layout
//!
//! | Area          | Content                                             |
//! |---------------|-----------------------------------------------------|
//! | Header        | title + subtitle                                    |
//! | Centre        | scrolling log, sticks to the newest line            |
//! | Bottom        | "set up" (disabled while busy) and "quit"           |
//! | Modal window  | install confirmation with the package list          |

use std::thread::JoinHandle;
use std::time::Duration;

use eframe::egui;
use tokio::sync::{mpsc, oneshot};

use crate::notify::UiEvent;
use crate::provision::{ProvisionError, ProvisionReport, Provisioner};

type Worker = JoinHandle<Result<ProvisionReport, ProvisionError>>;

/// An install prompt waiting for the user's answer.
struct PendingInstall {
    packages: Vec<String>,
    reply: oneshot::Sender<bool>,
}

// ---------------------------------------------------------------------------
// VirtualMicApp
// ---------------------------------------------------------------------------

/// eframe application: the provisioning window.
pub struct VirtualMicApp {
    // ── Transcript ───────────────────────────────────────────────────────
    lines: Vec<String>,

    // ── Controls ─────────────────────────────────────────────────────────
    /// Latest value of the controls signal from the worker.
    controls_enabled: bool,
    /// Set once at startup when no supported package manager exists.
    start_blocked: bool,
    pending_install: Option<PendingInstall>,

    // ── Provisioning ─────────────────────────────────────────────────────
    provisioner: Provisioner,
    worker: Option<Worker>,
    events: mpsc::UnboundedReceiver<UiEvent>,
}

impl VirtualMicApp {
    /// Create the app and write the startup banner.
    ///
    /// * `provisioner`: shared with the worker thread it spawns.
    /// * `events`: receiver paired with the provisioner's sink.
    pub fn new(provisioner: Provisioner, events: mpsc::UnboundedReceiver<UiEvent>) -> Self {
        let mut app = Self {
            lines: Vec::new(),
            controls_enabled: true,
            start_blocked: false,
            pending_install: None,
            provisioner,
            worker: None,
            events,
        };
        app.banner();
        app
    }

    fn banner(&mut self) {
        self.push_line("booted.".to_string());
        match self.provisioner.profile().map(|p| p.family()) {
            Some(family) => self.push_line(format!("package manager: {family} detected")),
            None => {
                self.push_line("no package manager found".to_string());
                self.start_blocked = true;
            }
        }
    }

    /// Lines written by the shell itself also go to the terminal log.
    fn push_line(&mut self, line: String) {
        log::info!("{line}");
        self.lines.push(line);
    }

    fn can_start(&self) -> bool {
        self.controls_enabled && !self.start_blocked && self.pending_install.is_none()
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending worker events (non-blocking).
    fn poll_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Log(line) => self.lines.push(line),
            UiEvent::ControlsEnabled(enabled) => self.controls_enabled = enabled,
            UiEvent::ConfirmInstall { packages, reply } => {
                self.pending_install = Some(PendingInstall { packages, reply });
            }
        }
    }

    /// Join the worker once it has finished so its handle does not linger.
    fn reap_worker(&mut self) {
        if self.worker.as_ref().is_some_and(|w| w.is_finished()) {
            if let Some(worker) = self.worker.take() {
                if worker.join().is_err() {
                    log::error!("app: provisioning thread panicked");
                }
            }
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    fn start_provisioning(&mut self) {
        match self.provisioner.start() {
            Ok(worker) => self.worker = Some(worker),
            // Already reported to the sink.
            Err(ProvisionError::AlreadyRunning) => {}
            Err(e) => self.push_line(e.to_string()),
        }
    }

    /// Answer the pending install prompt, if any.
    fn answer_install(&mut self, accept: bool) {
        if let Some(pending) = self.pending_install.take() {
            if pending.reply.send(accept).is_err() {
                log::warn!("app: install prompt answered after the worker gave up");
            }
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_header(&self, ui: &mut egui::Ui) {
        ui.heading("Virtual Mic");
        ui.label(
            egui::RichText::new("route your text-to-speech app into a recordable input")
                .color(egui::Color32::from_rgb(140, 140, 140))
                .size(12.0),
        );
    }

    fn draw_log(&self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.lines {
                    ui.label(egui::RichText::new(line.as_str()).monospace().size(11.0));
                }
            });
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.horizontal(|ui| {
            let start = ui.add_enabled(self.can_start(), egui::Button::new("set up"));
            if start.clicked() {
                self.start_provisioning();
            }
            if ui.button("quit").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            if self.provisioner.is_running() {
                ui.spinner();
                ui.label(
                    egui::RichText::new(self.provisioner.phase().label())
                        .color(egui::Color32::from_rgb(68, 136, 255))
                        .size(12.0),
                );
            }
        });
    }

    /// Modal install confirmation.
    fn draw_install_prompt(&mut self, ctx: &egui::Context) {
        let Some(pending) = &self.pending_install else {
            return;
        };

        let mut answer = None;
        egui::Window::new("install missing packages?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("these packages are needed:");
                for package in &pending.packages {
                    ui.label(egui::RichText::new(format!("  {package}")).monospace());
                }
                ui.add_space(6.0);
                ui.horizontal(|ui| {
                    if ui.button("install").clicked() {
                        answer = Some(true);
                    }
                    if ui.button("cancel").clicked() {
                        answer = Some(false);
                    }
                });
            });

        if let Some(accept) = answer {
            self.answer_install(accept);
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VirtualMicApp {
    /// Called every frame by eframe.  Polls the worker channel, then renders.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_events();
        self.reap_worker();

        // Keep polling while the worker may still post events.
        if self.provisioner.is_running() || self.worker.is_some() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| self.draw_header(ui));

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_controls(ui, ctx);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| self.draw_log(ui));

        self.draw_install_prompt(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        // Dropping an unanswered prompt declines it.
        self.pending_install = None;
        log::info!("app: window closing");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
