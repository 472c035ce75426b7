use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;

use crate::encode;
use crate::session::{self, Session, Sidebar, SidebarMode};
use crate::worker::{EditEvent, EditWorker};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    View,
    Compare,
}

pub struct PravkaApp {
    session: Session,
    sidebar: Sidebar,

    worker: Option<EditWorker>,
    worker_error: Option<String>,

    // GPU aliases for the session's blobs, rebuilt when the underlying
    // reference changes and freed when the handle is dropped.
    original_texture: Option<egui::TextureHandle>,
    original_texture_ref: Option<session::ImageRef>,
    edited_texture: Option<egui::TextureHandle>,
    edited_texture_for: Option<uuid::Uuid>,

    tab: Tab,
    showing_original: bool,
    slider_position: f32,
    notice: Option<String>,
}

impl PravkaApp {
    pub fn new(cc: &eframe::CreationContext<'_>, initial_path: Option<PathBuf>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);

        let (worker, worker_error) = match EditWorker::new() {
            Ok(worker) => (Some(worker), None),
            Err(err) => {
                log::warn!("edit worker unavailable: {err}");
                (None, Some(err))
            }
        };

        let mut app = Self {
            session: Session::new(),
            sidebar: Sidebar::default(),
            worker,
            worker_error,
            original_texture: None,
            original_texture_ref: None,
            edited_texture: None,
            edited_texture_for: None,
            tab: Tab::View,
            showing_original: true,
            slider_position: 0.5,
            notice: None,
        };

        if let Some(path) = initial_path {
            app.load_path(&path);
        }

        app
    }

    fn load_path(&mut self, path: &Path) {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        match std::fs::read(path) {
            Ok(bytes) => self.try_upload(name, bytes),
            Err(err) => {
                self.notice = Some(format!("Could not read {}: {err}", path.display()));
            }
        }
    }

    /// Upload boundary: type and size are checked here; a rejection is
    /// an inline notice and never touches the session.
    fn try_upload(&mut self, name: String, bytes: Vec<u8>) {
        self.notice = None;
        if self.session.is_editing() {
            return;
        }
        if bytes.len() > encode::MAX_UPLOAD_BYTES {
            self.notice = Some("Please choose an image under 10 MB.".to_string());
            return;
        }
        match encode::sniff_media_type(&bytes) {
            Ok(media_type) => {
                let bytes: Arc<[u8]> = Arc::from(bytes.into_boxed_slice());
                if self.session.upload(bytes, media_type, name).is_some() {
                    self.sidebar.auto_close();
                    self.tab = Tab::View;
                    self.showing_original = true;
                    self.slider_position = 0.5;
                }
            }
            Err(err) => {
                log::debug!("rejected upload {name}: {err}");
                self.notice =
                    Some("Please upload a valid image file (PNG, JPG, WEBP).".to_string());
            }
        }
    }

    fn open_picker(&mut self) {
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Images", encode::ACCEPTED_EXTENSIONS)
            .pick_file()
        {
            self.load_path(&path);
        }
    }

    fn submit_edit(&mut self) {
        let Some(request) = self.session.submit_edit() else {
            return;
        };
        self.sidebar.auto_close();
        match &self.worker {
            Some(worker) => {
                if let Err(err) = worker.request_edit(request.bytes, request.prompt) {
                    self.session.edit_failed(err);
                }
            }
            None => {
                let message = self
                    .worker_error
                    .clone()
                    .unwrap_or_else(|| "edit service unavailable".to_string());
                self.session.edit_failed(message);
            }
        }
    }

    fn download_result(&mut self) {
        let Some(result) = self.session.result() else {
            return;
        };
        let bytes = result.bytes.clone();
        let extension = encode::extension_for(&result.media_type);
        if let Some(path) = rfd::FileDialog::new()
            .set_file_name(format!("ai-edited-image.{extension}"))
            .save_file()
        {
            match std::fs::write(&path, &bytes) {
                Ok(()) => log::info!("saved edited image to {}", path.display()),
                Err(err) => self.notice = Some(format!("Could not save image: {err}")),
            }
        }
    }

    fn apply_worker_events(&mut self) {
        let Some(worker) = &mut self.worker else {
            return;
        };
        for event in worker.poll_events() {
            match event {
                EditEvent::Completed { image, caption } => {
                    if self.session.edit_succeeded(image, caption).is_some() {
                        // A fresh result is shown immediately.
                        self.showing_original = false;
                    }
                }
                EditEvent::Failed { message } => {
                    self.session.edit_failed(message);
                }
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(file) = dropped.into_iter().next() {
            if let Some(path) = file.path {
                self.load_path(&path);
            } else if let Some(bytes) = file.bytes {
                self.try_upload(file.name, bytes.to_vec());
            }
        }
    }

    fn sync_textures(&mut self, ctx: &egui::Context) {
        let current_ref = self.session.original().map(|source| source.reference);
        if current_ref != self.original_texture_ref {
            self.original_texture_ref = current_ref;
            self.original_texture = None;
            if let Some(bytes) = self.session.original().map(|source| source.bytes.clone()) {
                match load_texture(ctx, "original", &bytes) {
                    Ok(texture) => self.original_texture = Some(texture),
                    Err(err) => log::warn!("could not decode original image: {err}"),
                }
            }
        }

        let active = self.session.active_entry();
        if active != self.edited_texture_for {
            self.edited_texture_for = active;
            self.edited_texture = None;
            if let Some(bytes) = self.session.result().map(|result| result.bytes.clone()) {
                match load_texture(ctx, "edited", &bytes) {
                    Ok(texture) => self.edited_texture = Some(texture),
                    Err(err) => log::warn!("could not decode edited image: {err}"),
                }
            }
        }
    }

    fn header(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("pravka");
                ui.label("describe the edit, let the model do the rest");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("History").clicked() {
                        self.sidebar.open = !self.sidebar.open;
                    }
                });
            });
        });
    }

    fn history_panel(&mut self, ctx: &egui::Context) {
        if !self.sidebar.open {
            return;
        }
        let response = egui::SidePanel::right("history_panel")
            .resizable(true)
            .default_width(self.sidebar.width())
            .width_range(session::MIN_PANEL_WIDTH..=session::MAX_PANEL_WIDTH)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Edit History");
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("Close").clicked() {
                            self.sidebar.open = false;
                        }
                        let (label, tooltip) = match self.sidebar.mode {
                            SidebarMode::Locked => {
                                ("Locked", "Switch to float mode (auto-closes)")
                            }
                            SidebarMode::Float => ("Float", "Switch to locked mode (stays open)"),
                        };
                        if ui.button(label).on_hover_text(tooltip).clicked() {
                            self.sidebar.toggle_mode();
                        }
                    });
                });
                ui.separator();

                if self.session.history().is_empty() {
                    ui.centered_and_justified(|ui| {
                        ui.label("Your previous edits will appear here.");
                    });
                    return;
                }

                let mut clicked = None;
                egui::ScrollArea::vertical().show(ui, |ui| {
                    for entry in self.session.history() {
                        let selected = Some(entry.id) == self.session.active_entry();
                        let mut response =
                            ui.selectable_label(selected, truncate(&entry.prompt, 80));
                        if let Some(caption) = &entry.caption {
                            response = response.on_hover_text(caption.clone());
                        }
                        if response.clicked() {
                            clicked = Some(entry.id);
                        }
                    }
                });
                if let Some(id) = clicked {
                    if self.session.select_history(id).is_some() {
                        self.sidebar.auto_close();
                        self.showing_original = false;
                        self.tab = Tab::View;
                    }
                }
            });
        self.sidebar.set_width(response.response.rect.width());
    }

    fn uploader(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.add_space(ui.available_height() * 0.3);
            ui.label("Drag & drop an image here");
            ui.label("or");
            if ui.button("Click to upload").clicked() {
                self.open_picker();
            }
            ui.small("PNG, JPG, WEBP up to 10 MB");
            if let Some(notice) = &self.notice {
                ui.colored_label(egui::Color32::LIGHT_RED, notice);
            }
        });
    }

    fn view_tab(&mut self, ui: &mut egui::Ui) {
        let has_result = self.session.result().is_some() && self.edited_texture.is_some();
        let show_original = self.showing_original || !has_result;

        let texture = if show_original {
            self.original_texture.as_ref()
        } else {
            self.edited_texture.as_ref()
        };

        let image_height = (ui.available_height() - 120.0).max(120.0);
        ui.allocate_ui(egui::vec2(ui.available_width(), image_height), |ui| {
            ui.centered_and_justified(|ui| match texture {
                Some(texture) => {
                    ui.add(egui::Image::new(texture).shrink_to_fit());
                }
                None => {
                    ui.label("Your edited image will appear here.");
                }
            });
        });
        ui.label(if show_original { "Original" } else { "Edited" });

        ui.horizontal(|ui| {
            let toggle_label = if show_original {
                "Show Edited"
            } else {
                "Show Original"
            };
            if ui
                .add_enabled(has_result, egui::Button::new(toggle_label))
                .clicked()
            {
                self.showing_original = !self.showing_original;
            }
            let can_download = has_result && !show_original;
            if ui
                .add_enabled(can_download, egui::Button::new("Download"))
                .clicked()
            {
                self.download_result();
            }
        });

        if let Some(caption) = self.session.caption() {
            ui.small(format!("AI: {caption}"));
        }
    }

    /// Wipe comparison: the original fills the rect, the edited image
    /// is clipped to the left of a draggable split line.
    fn compare_tab(&mut self, ui: &mut egui::Ui) {
        let (Some(original), Some(edited)) = (&self.original_texture, &self.edited_texture)
        else {
            ui.centered_and_justified(|ui| {
                ui.label("An edited image is needed to use the compare slider.");
            });
            return;
        };

        let available = ui.available_size();
        let image_size = original.size_vec2();
        let scale = (available.x / image_size.x)
            .min(available.y / image_size.y)
            .min(1.0);
        let display_size = image_size * scale.max(0.05);

        let (rect, response) = ui.allocate_exact_size(display_size, egui::Sense::click_and_drag());
        if response.clicked() || response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.slider_position = ((pos.x - rect.left()) / rect.width()).clamp(0.0, 1.0);
            }
        }

        let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
        let painter = ui.painter_at(rect);
        painter.image(original.id(), rect, uv, egui::Color32::WHITE);

        let split_x = rect.left() + rect.width() * self.slider_position;
        let clip = egui::Rect::from_min_max(rect.min, egui::pos2(split_x, rect.bottom()));
        painter
            .with_clip_rect(clip)
            .image(edited.id(), rect, uv, egui::Color32::WHITE);
        painter.vline(
            split_x,
            rect.y_range(),
            egui::Stroke::new(2.0, egui::Color32::WHITE),
        );
    }

    fn editor(&mut self, ui: &mut egui::Ui) {
        let editing = self.session.is_editing();
        let has_result = self.session.result().is_some();

        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.tab, Tab::View, "View");
            if ui
                .add_enabled(
                    has_result,
                    egui::SelectableLabel::new(self.tab == Tab::Compare, "Compare"),
                )
                .clicked()
            {
                self.tab = Tab::Compare;
            }
        });
        ui.separator();

        match self.tab {
            Tab::View => self.view_tab(ui),
            Tab::Compare => self.compare_tab(ui),
        }

        if editing {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Your edit is in progress... this can take a few moments.");
            });
        }

        if let Some(message) = self.session.error_message() {
            let message = format!("Error: {message}");
            ui.colored_label(egui::Color32::LIGHT_RED, message);
        }

        ui.separator();
        ui.label("Describe your edit");
        let prompt_response = ui.add_enabled(
            !editing,
            egui::TextEdit::multiline(self.session.prompt_mut())
                .desired_rows(3)
                .desired_width(f32::INFINITY)
                .hint_text("e.g., 'add a cat wearing a party hat', 'turn this into a watercolor painting'"),
        );
        if prompt_response.changed() {
            self.session.prompt_edited();
        }

        ui.horizontal(|ui| {
            let can_submit = !editing && !self.session.prompt().trim().is_empty();
            if ui
                .add_enabled(can_submit, egui::Button::new("Edit Photo"))
                .clicked()
            {
                self.submit_edit();
            }
            if ui
                .add_enabled(!editing, egui::Button::new("Replace Image"))
                .clicked()
            {
                self.open_picker();
            }
        });

        if let Some(notice) = &self.notice {
            ui.colored_label(egui::Color32::LIGHT_RED, notice);
        }
    }
}

impl eframe::App for PravkaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_worker_events();
        self.handle_dropped_files(ctx);
        self.sync_textures(ctx);

        self.header(ctx);
        self.history_panel(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(err) = &self.worker_error {
                ui.colored_label(
                    egui::Color32::YELLOW,
                    format!("Edit service unavailable: {err}"),
                );
            }
            if self.session.original().is_none() {
                self.uploader(ui);
            } else {
                self.editor(ui);
            }
        });

        // Keep polling while a request is in flight.
        if self.session.is_editing() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

fn load_texture(
    ctx: &egui::Context,
    name: &str,
    bytes: &[u8],
) -> Result<egui::TextureHandle, String> {
    let img = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let rgba = img.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let pixels = rgba.into_raw();
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, &pixels);
    Ok(ctx.load_texture(name, color_image, egui::TextureOptions::LINEAR))
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::truncate;

    #[test]
    fn truncate_leaves_short_text_alone() {
        assert_eq!(truncate("make it sepia", 80), "make it sepia");
    }

    #[test]
    fn truncate_cuts_on_char_boundaries() {
        let text = "добавь кота в шляпе и сделай небо как галактика";
        let cut = truncate(text, 10);
        assert_eq!(cut, "добавь кот...");
    }
}
