mod display_types;
mod progress;
mod state;
mod worker;

use std::path::PathBuf;
use std::time::Duration;

use iced::widget::{
    button, checkbox, column, container, pick_list, progress_bar, row, scrollable, text,
    text_input, Column,
};
use iced::{
    clipboard, event, executor, window, Alignment, Application, Command, Element, Event, Length,
    Subscription, Theme,
};
use savemgr_engine::default_config_dir;

use display_types::{tag_color, LogFilter, FOUND_COLORS, SPEED_COLOR, STATUS_COLOR};
use state::AppState;
use worker::Workers;

/// How often worker channels are drained while a job runs
const TICK: Duration = Duration::from_millis(100);

pub fn main() -> iced::Result {
    init_logging();
    GuiApp::run(iced::Settings {
        window: window::Settings {
            exit_on_close_request: false,
            ..window::Settings::default()
        },
        ..iced::Settings::default()
    })
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();
}

#[derive(Debug, Clone)]
pub enum Message {
    NameChanged(String),
    SourceChanged(String),
    DestinationChanged(String),
    BrowseSourcePressed,
    BrowseDestinationPressed,
    AddEntryPressed,
    RemoveEntryPressed(String),
    ClearEntriesPressed,
    CopyFolderToggled(bool),
    SkipExistingToggled(bool),
    SkipHiddenToggled(bool),
    ClearDestinationToggled(bool),
    SizeLimitChanged(String),
    CopyAllPressed,
    CancelPressed,
    FindSavesPressed,
    LogFilterChanged(LogFilter),
    CopyToClipboard(PathBuf),
    Tick,
    CloseRequested,
}

pub struct GuiApp {
    state: AppState,
    workers: Workers,
}

impl GuiApp {
    fn start_copy(&mut self) {
        if self.workers.is_copying() {
            return;
        }
        if self.state.entries.is_empty() {
            self.state.status = "No entries to copy.".to_string();
            return;
        }

        let config = self
            .state
            .settings
            .copy_job_config(self.state.entries.snapshot());
        self.state.begin_copy();
        if let Err(e) = self.workers.start_copy(config) {
            self.state.show_progress = false;
            self.state.status = format!("Failed to start copy: {}", e);
        }
    }

    fn start_scan(&mut self) {
        if self.workers.is_scanning() {
            return;
        }
        self.state.begin_scan();
        if let Err(e) = self.workers.start_scan(self.state.settings.discovery_config()) {
            self.state.scan_fraction = None;
            self.state.status = format!("Failed to start search: {}", e);
        }
    }

    fn drain_workers(&mut self) {
        let copy = self.workers.poll_copy();
        for event in copy.events {
            self.state.apply_copy_event(event);
        }
        if let Some(report) = copy.finished {
            self.state.finish_copy(&report);
        }

        let scan = self.workers.poll_scan();
        for event in scan.events {
            self.state.apply_discovery_event(event);
        }
        if let Some(result) = scan.finished {
            self.state.finish_scan(&result);
        }
    }

    fn entries_view(&self) -> Element<Message> {
        if self.state.entries.is_empty() {
            return text("No entries yet.").into();
        }
        let rows: Vec<Element<Message>> = self
            .state
            .entries
            .iter()
            .map(|entry| {
                row![
                    button(text(entry.to_string()))
                        .style(iced::theme::Button::Text)
                        .on_press(Message::CopyToClipboard(entry.source.clone()))
                        .width(Length::Fill),
                    button("Remove").on_press(Message::RemoveEntryPressed(entry.name.clone())),
                ]
                .spacing(10)
                .align_items(Alignment::Center)
                .into()
            })
            .collect();
        scrollable(Column::with_children(rows).spacing(4))
            .height(Length::Fixed(140.0))
            .into()
    }

    fn log_view(&self) -> Element<Message> {
        let lines: Vec<Element<Message>> = self
            .state
            .visible_log()
            .map(|d| text(d.to_string()).style(tag_color(d.tag)).into())
            .collect();
        scrollable(Column::with_children(lines).spacing(2))
            .height(Length::Fixed(160.0))
            .width(Length::Fill)
            .into()
    }

    fn finder_view(&self) -> Element<Message> {
        let mut col = column![text("Save folders").size(18)].spacing(6);
        if let Some(fraction) = self.state.scan_fraction {
            col = col.push(progress_bar(0.0..=1.0, fraction));
        }
        if self.state.scan_finished && self.state.found.is_empty() {
            col = col.push(text("No files found."));
        }
        let found: Vec<Element<Message>> = self
            .state
            .found
            .iter()
            .enumerate()
            .map(|(i, dir)| {
                button(text(format!("{}. {}", i + 1, dir.display())).style(FOUND_COLORS[i % 2]))
                    .style(iced::theme::Button::Text)
                    .on_press(Message::CopyToClipboard(dir.clone()))
                    .into()
            })
            .collect();
        col.push(scrollable(Column::with_children(found)).height(Length::Fixed(140.0)))
            .into()
    }
}

impl Application for GuiApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Message>) {
        let app = GuiApp {
            state: AppState::load(default_config_dir()),
            workers: Workers::default(),
        };
        (app, Command::none())
    }

    fn title(&self) -> String {
        "SaveManager".to_string()
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::NameChanged(name) => self.state.name_input = name,
            Message::SourceChanged(path) => self.state.source_input = path,
            Message::DestinationChanged(path) => self.state.destination_input = path,
            Message::BrowseSourcePressed => {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.state.set_source(&path);
                }
            }
            Message::BrowseDestinationPressed => {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.state.set_destination(&path);
                }
            }
            Message::AddEntryPressed => {
                self.state.add_entry_from_form();
            }
            Message::RemoveEntryPressed(name) => self.state.remove_entry(&name),
            Message::ClearEntriesPressed => self.state.clear_entries(),
            Message::CopyFolderToggled(on) => {
                self.state.settings.copy_folder_checkbox_state = on;
                self.state.save_settings();
            }
            Message::SkipExistingToggled(on) => {
                self.state.settings.skip_existing_files = on;
                self.state.save_settings();
            }
            Message::SkipHiddenToggled(on) => {
                self.state.settings.skip_hidden_files = on;
                self.state.save_settings();
            }
            Message::ClearDestinationToggled(on) => {
                self.state.settings.clear_destination_folder = on;
                self.state.save_settings();
            }
            Message::SizeLimitChanged(input) => self.state.set_size_limit(input),
            Message::CopyAllPressed => self.start_copy(),
            Message::CancelPressed => {
                if self.workers.cancel() {
                    self.state.status = "Operation was cancelled.".to_string();
                }
            }
            Message::FindSavesPressed => self.start_scan(),
            Message::LogFilterChanged(filter) => self.state.log_filter = filter,
            Message::CopyToClipboard(path) => {
                let path = path.display().to_string();
                self.state.status = format!("Copied to clipboard: {}", path);
                return clipboard::write(path);
            }
            Message::Tick => self.drain_workers(),
            Message::CloseRequested => {
                self.workers.shutdown();
                self.drain_workers();
                self.state.save_settings();
                return window::close(window::Id::MAIN);
            }
        }
        Command::none()
    }

    fn subscription(&self) -> Subscription<Message> {
        let close = event::listen_with(|event, _status| match event {
            Event::Window(_, window::Event::CloseRequested) => Some(Message::CloseRequested),
            _ => None,
        });
        if self.workers.is_busy() {
            Subscription::batch([close, iced::time::every(TICK).map(|_| Message::Tick)])
        } else {
            close
        }
    }

    fn view(&self) -> Element<Message> {
        let busy = self.workers.is_busy();
        let settings = &self.state.settings;

        let form = column![
            text_input("Entry name", &self.state.name_input)
                .on_input(Message::NameChanged),
            row![
                text_input("Source folder", &self.state.source_input)
                    .on_input(Message::SourceChanged)
                    .width(Length::Fill),
                button("Browse...").on_press(Message::BrowseSourcePressed),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
            row![
                text_input("Destination folder", &self.state.destination_input)
                    .on_input(Message::DestinationChanged)
                    .width(Length::Fill),
                button("Browse...").on_press(Message::BrowseDestinationPressed),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
            row![
                button("Add Entry").on_press(Message::AddEntryPressed),
                button("Clear Entries").on_press_maybe(
                    if busy { None } else { Some(Message::ClearEntriesPressed) }
                ),
            ]
            .spacing(10),
        ]
        .spacing(10);

        let options = column![
            row![
                checkbox("Copy folder", settings.copy_folder_checkbox_state)
                    .on_toggle(Message::CopyFolderToggled),
                checkbox("Skip existing files", settings.skip_existing_files)
                    .on_toggle(Message::SkipExistingToggled),
                checkbox("Skip hidden files", settings.skip_hidden_files)
                    .on_toggle(Message::SkipHiddenToggled),
                checkbox("Clear destination first", settings.clear_destination_folder)
                    .on_toggle(Message::ClearDestinationToggled),
            ]
            .spacing(15),
            row![
                text("Size limit (GB)"),
                text_input("5", &self.state.size_limit_input)
                    .on_input(Message::SizeLimitChanged)
                    .width(Length::Fixed(80.0)),
            ]
            .spacing(10)
            .align_items(Alignment::Center),
        ]
        .spacing(10);

        let actions = row![
            button("Copy All").on_press_maybe(
                if self.workers.is_copying() { None } else { Some(Message::CopyAllPressed) }
            ),
            button("Cancel").on_press_maybe(if busy { Some(Message::CancelPressed) } else { None }),
            button("Find Saves").on_press_maybe(
                if self.workers.is_scanning() { None } else { Some(Message::FindSavesPressed) }
            ),
        ]
        .spacing(10);

        let mut progress_section = column![].spacing(5);
        if self.state.show_progress {
            progress_section = progress_section
                .push(progress_bar(0.0..=1.0, self.state.progress.fraction()))
                .push(text(progress::tracker_speed_line(&self.state.progress)).style(SPEED_COLOR));
        }
        progress_section = progress_section.push(text(&self.state.status).style(STATUS_COLOR));

        let log_header = row![
            text("Copy log").size(18).width(Length::Fill),
            pick_list(
                LogFilter::options(),
                Some(self.state.log_filter),
                Message::LogFilterChanged,
            ),
        ]
        .align_items(Alignment::Center);

        let content = column![
            text("SaveManager").size(24),
            form,
            options,
            text("Folder pairs (click to copy the source path):"),
            self.entries_view(),
            actions,
            progress_section,
            log_header,
            self.log_view(),
            self.finder_view(),
        ]
        .spacing(15)
        .padding(20);

        container(scrollable(content)).into()
    }
}
