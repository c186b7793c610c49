use iced::widget::{
    button, checkbox, column, container, row, scrollable, slider, text, text_input, Column,
};
use iced::{Alignment, Element, Length, Task, Theme};
use log::{info, warn};
use rfd::FileDialog;
use std::ops::RangeInclusive;
use std::sync::Arc;

mod engine;
mod logging;
mod state;

use engine::{ConvertSummary, EngineGateway, ProcessEngineGateway};
use state::options::{ConvertOptions, OptionUpdate};
use state::session::{self, Session};
use state::tasks::TaskState;
use state::uploads::FileHandle;

/// Image formats offered by the file picker
///
/// This is a picker affordance only — anything that ends up in the queue is
/// sent to the engine as-is, and the engine rejects what it cannot decode.
const PICKER_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Main application state
struct Pixmix {
    /// The session controller: queue, options, task slots
    session: Session,
    /// Boundary to the external processing engine
    gateway: Arc<dyn EngineGateway>,
    /// Name field for the preset controls
    preset_name: String,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked "Add Images" — open the native picker
    AddFiles,
    /// Remove one queued item by id
    RemoveFile(String),
    /// Empty the queue and drop the preview
    Reset,
    /// One option field changed
    OptionChanged(OptionUpdate),
    /// Output root text edited
    OutputRootChanged(String),
    /// Request a preview for one queued item
    Preview(String),
    /// A preview call resolved (sequence number, outcome)
    PreviewResolved(u64, Result<Vec<u8>, String>),
    /// Convert the whole queue
    Convert,
    /// A convert call resolved (sequence number, outcome)
    ConvertResolved(u64, Result<ConvertSummary, String>),
    /// Preset name field edited
    PresetNameChanged(String),
    SavePreset,
    PresetSaved(Result<(), String>),
    LoadPreset,
    PresetLoaded(Result<ConvertOptions, String>),
}

impl Pixmix {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let session = Session::new();
        let gateway: Arc<dyn EngineGateway> = Arc::new(ProcessEngineGateway::from_env());

        info!("🧺 pixmix session ready");

        (
            Pixmix {
                session,
                gateway,
                preset_name: String::new(),
                status: "Ready. Add images to begin.".to_string(),
            },
            Task::none(),
        )
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::AddFiles => {
                let picked = FileDialog::new()
                    .set_title("Select Images")
                    .add_filter("Images", &PICKER_EXTENSIONS)
                    .pick_files()
                    .unwrap_or_default();

                let mut handles = Vec::with_capacity(picked.len());
                for path in picked {
                    match FileHandle::from_path(path.clone()) {
                        Ok(handle) => handles.push(handle),
                        Err(e) => warn!("⚠️  Skipping {}: {}", path.display(), e),
                    }
                }

                if !handles.is_empty() {
                    let added = handles.len();
                    self.session.uploads.add_files(handles);
                    self.status = format!(
                        "Added {} image(s). {} queued.",
                        added,
                        self.session.uploads.len()
                    );
                }

                Task::none()
            }
            Message::RemoveFile(id) => {
                self.session.uploads.remove(&id);
                self.status = format!("{} image(s) queued.", self.session.uploads.len());
                Task::none()
            }
            Message::Reset => {
                self.session.reset();
                self.status = "Queue cleared.".to_string();
                Task::none()
            }
            Message::OptionChanged(update) => {
                self.session.options.set(update);
                Task::none()
            }
            Message::OutputRootChanged(value) => {
                self.session.output_root = value;
                Task::none()
            }
            Message::Preview(id) => {
                if let Some(ticket) = self.session.begin_preview(&id) {
                    self.status = format!("Generating preview for {}...", ticket.file.name());
                    let gateway = Arc::clone(&self.gateway);
                    return Task::perform(
                        session::run_preview(gateway, ticket),
                        |(seq, outcome)| Message::PreviewResolved(seq, outcome),
                    );
                }
                Task::none()
            }
            Message::PreviewResolved(seq, outcome) => {
                if self.session.finish_preview(seq, outcome) {
                    self.status = match self.session.preview_state() {
                        TaskState::Success(_) => "✅ Preview ready.".to_string(),
                        TaskState::Error(e) => format!("❌ Preview failed: {}", e),
                        _ => self.status.clone(),
                    };
                }
                Task::none()
            }
            Message::Convert => {
                if let Some(ticket) = self.session.begin_convert() {
                    self.status = format!("Converting {} image(s)...", ticket.files.len());
                    let gateway = Arc::clone(&self.gateway);
                    return Task::perform(
                        session::run_convert(gateway, ticket),
                        |(seq, outcome)| Message::ConvertResolved(seq, outcome),
                    );
                }
                self.status = "Add images before converting.".to_string();
                Task::none()
            }
            Message::ConvertResolved(seq, outcome) => {
                if self.session.finish_convert(seq, outcome) {
                    self.status = match self.session.convert_state() {
                        TaskState::Success(summary) => {
                            info!(
                                "📊 Batch done: {} ok, {} failed, output {}",
                                summary.succeeded, summary.failed, summary.output_dir
                            );
                            format!(
                                "✅ Converted {} image(s), {} failed. Output: {}",
                                summary.succeeded, summary.failed, summary.output_dir
                            )
                        }
                        TaskState::Error(e) => format!("❌ Convert failed: {}", e),
                        _ => self.status.clone(),
                    };
                }
                Task::none()
            }
            Message::PresetNameChanged(value) => {
                self.preset_name = value;
                Task::none()
            }
            Message::SavePreset => {
                let name = self.preset_name.trim().to_string();
                if name.is_empty() {
                    self.status = "Name the preset before saving.".to_string();
                    return Task::none();
                }
                let gateway = Arc::clone(&self.gateway);
                let options = self.session.options.get();
                Task::perform(
                    async move {
                        gateway
                            .save_preset(name, options)
                            .await
                            .map_err(|e| e.to_string())
                    },
                    Message::PresetSaved,
                )
            }
            Message::PresetSaved(outcome) => {
                self.status = match outcome {
                    Ok(()) => format!("✅ Preset '{}' saved.", self.preset_name.trim()),
                    Err(e) => format!("❌ Preset save failed: {}", e),
                };
                Task::none()
            }
            Message::LoadPreset => {
                let name = self.preset_name.trim().to_string();
                if name.is_empty() {
                    self.status = "Name the preset to load.".to_string();
                    return Task::none();
                }
                let gateway = Arc::clone(&self.gateway);
                Task::perform(
                    async move { gateway.load_preset(name).await.map_err(|e| e.to_string()) },
                    Message::PresetLoaded,
                )
            }
            Message::PresetLoaded(outcome) => {
                self.status = match self.session.finish_preset_load(outcome) {
                    Ok(()) => format!("✅ Preset '{}' loaded.", self.preset_name.trim()),
                    Err(e) => format!("❌ Preset load failed: {}", e),
                };
                Task::none()
            }
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let header = row![
            text("pixmix").size(32),
            text(&self.status).size(14).width(Length::Fill),
            button("Add Images").on_press(Message::AddFiles).padding(8),
            button("Reset").on_press(Message::Reset).padding(8),
            button("Convert")
                .on_press_maybe((!self.session.uploads.is_empty()).then_some(Message::Convert))
                .padding(8),
        ]
        .spacing(16)
        .align_y(Alignment::Center);

        let content = row![
            column![self.file_list(), self.convert_line()]
                .spacing(12)
                .width(Length::FillPortion(3)),
            column![self.preview_pane(), self.options_panel()]
                .spacing(12)
                .width(Length::FillPortion(2)),
        ]
        .spacing(20)
        .height(Length::Fill);

        container(column![header, content].spacing(20).padding(24))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// The queued files, in the order they were added
    fn file_list(&self) -> Element<Message> {
        let mut rows: Column<Message> = column![].spacing(6);

        for item in self.session.uploads.iter() {
            let size_mb = item.file.size() as f64 / 1024.0 / 1024.0;
            rows = rows.push(
                row![
                    text(item.file.name().to_string()).width(Length::Fill),
                    text(format!("{:.2} MB", size_mb)).size(13),
                    button("Preview").on_press(Message::Preview(item.id.clone())),
                    button("Remove").on_press(Message::RemoveFile(item.id.clone())),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        if self.session.uploads.is_empty() {
            rows = rows.push(text("No images queued.").size(14));
        }

        column![
            text(format!("Queue ({} files)", self.session.uploads.len())).size(18),
            scrollable(rows).height(Length::Fill),
        ]
        .spacing(8)
        .height(Length::Fill)
        .into()
    }

    /// Outcome of the last batch conversion, if any
    fn convert_line(&self) -> Element<Message> {
        let line = match self.session.convert_state() {
            TaskState::Idle => String::new(),
            TaskState::Pending => "Converting...".to_string(),
            TaskState::Success(summary) => format!(
                "Last batch: {} converted, {} failed → {}",
                summary.succeeded, summary.failed, summary.output_dir
            ),
            TaskState::Error(e) => format!("Last batch failed: {}", e),
        };
        text(line).size(14).into()
    }

    /// The single live preview frame (or the state of getting one)
    fn preview_pane(&self) -> Element<Message> {
        let body: Element<Message> = match self.session.preview_state() {
            TaskState::Idle => text("No preview yet.").size(14).into(),
            TaskState::Pending => text("Generating preview...").size(14).into(),
            TaskState::Success(frame) => iced::widget::image(frame.widget_handle())
                .width(Length::Fill)
                .into(),
            TaskState::Error(e) => text(format!("Preview failed: {}", e)).size(14).into(),
        };

        column![
            text("Preview").size(18),
            container(body)
                .width(Length::Fill)
                .height(Length::Fixed(260.0)),
        ]
        .spacing(8)
        .into()
    }

    /// All the transform knobs plus output root and preset controls
    fn options_panel(&self) -> Element<Message> {
        let opts = self.session.options.get();

        let sliders = column![
            labeled_slider("Resize min", opts.resize_min, 0.5..=1.0, 0.01, |v| {
                Message::OptionChanged(OptionUpdate::ResizeMin(v))
            }),
            labeled_slider("Resize max", opts.resize_max, 1.0..=2.0, 0.01, |v| {
                Message::OptionChanged(OptionUpdate::ResizeMax(v))
            }),
            labeled_slider(
                "Rotation max (deg)",
                opts.rotate_max_deg,
                0.0..=10.0,
                0.5,
                |v| Message::OptionChanged(OptionUpdate::RotateMaxDeg(v))
            ),
            labeled_slider(
                "Brightness range",
                opts.brightness_range,
                0.0..=20.0,
                0.5,
                |v| Message::OptionChanged(OptionUpdate::BrightnessRange(v))
            ),
            labeled_slider(
                "Contrast range",
                opts.contrast_range,
                0.0..=20.0,
                0.5,
                |v| Message::OptionChanged(OptionUpdate::ContrastRange(v))
            ),
            labeled_slider("Noise sigma", opts.noise_sigma, 0.0..=5.0, 0.1, |v| {
                Message::OptionChanged(OptionUpdate::NoiseSigma(v))
            }),
            quality_slider("JPEG quality", opts.jpeg_quality, |v| {
                Message::OptionChanged(OptionUpdate::JpegQuality(v))
            }),
            quality_slider("WEBP quality", opts.webp_quality, |v| {
                Message::OptionChanged(OptionUpdate::WebpQuality(v))
            }),
            checkbox("Strip EXIF metadata", opts.strip_exif)
                .on_toggle(|v| Message::OptionChanged(OptionUpdate::StripExif(v))),
        ]
        .spacing(10);

        let output_root = column![
            text("Output root").size(14),
            text_input("Defaults to the current directory", &self.session.output_root)
                .on_input(Message::OutputRootChanged),
        ]
        .spacing(4);

        let presets = row![
            text_input("Preset name", &self.preset_name).on_input(Message::PresetNameChanged),
            button("Save").on_press(Message::SavePreset),
            button("Load").on_press(Message::LoadPreset),
        ]
        .spacing(8)
        .align_y(Alignment::Center);

        column![text("Options").size(18), sliders, output_root, presets]
            .spacing(14)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// A slider with its label and current value on the line above it
fn labeled_slider<'a>(
    label: &'a str,
    value: f32,
    range: RangeInclusive<f32>,
    step: f32,
    on_change: fn(f32) -> Message,
) -> Element<'a, Message> {
    column![
        row![
            text(label).size(14).width(Length::Fill),
            text(format!("{:.2}", value)).size(14),
        ],
        slider(range, value, on_change).step(step),
    ]
    .spacing(4)
    .into()
}

/// Quality sliders are integer-valued and UI-bounded to 50-100
fn quality_slider<'a>(
    label: &'a str,
    value: u8,
    on_change: fn(u8) -> Message,
) -> Element<'a, Message> {
    column![
        row![
            text(label).size(14).width(Length::Fill),
            text(format!("{}", value)).size(14),
        ],
        slider(50..=100u8, value, on_change),
    ]
    .spacing(4)
    .into()
}

fn main() -> iced::Result {
    if let Err(e) = logging::init() {
        eprintln!("⚠️  Logging unavailable: {}", e);
    }

    iced::application("pixmix", Pixmix::update, Pixmix::view)
        .theme(Pixmix::theme)
        .centered()
        .run_with(Pixmix::new)
}
